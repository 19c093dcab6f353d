//! Edge-specific uses of phi instructions.
//!
//! A phi uses each incoming value only along the edge from its incoming
//! block. The solver consumes these sets when it propagates liveness across
//! a branch into a block that starts with phis.

use std::collections::BTreeMap;

use cranelift_entity::SecondaryMap;
use deadwood_ir::Function;
use deadwood_ir::refs::{BlockRef, InstRef};

use crate::live_set::LiveSet;

/// For each phi, the values used along the edge from each predecessor.
///
/// The set for phi `P` and block `B` holds `P`'s own incoming value from `B`
/// plus the incoming values from `B` of every phi after `P` in the leading
/// phi group. A branch into a block only visits its first phi, so the first
/// phi's sets cover the whole group.
#[derive(Clone, Debug, Default)]
pub struct PhiIncomingMap {
    map: SecondaryMap<InstRef, BTreeMap<BlockRef, LiveSet>>,
}

impl PhiIncomingMap {
    pub fn compute(func: &Function) -> Self {
        let mut map: SecondaryMap<InstRef, BTreeMap<BlockRef, LiveSet>> = SecondaryMap::new();

        for &block in func.layout() {
            let group: Vec<InstRef> = func
                .block_insts(block)
                .iter()
                .copied()
                .take_while(|&inst| func.is_phi(inst))
                .collect();

            let mut acc: BTreeMap<BlockRef, LiveSet> = BTreeMap::new();
            for &phi in group.iter().rev() {
                for (pred, operand) in func.phi_incoming(phi) {
                    let set = acc.entry(pred).or_default();
                    if let Some(v) = operand.as_value() {
                        set.insert(v);
                    }
                }
                map[phi] = acc.clone();
            }
        }

        Self { map }
    }

    /// Values used by `phi` (and the phis after it) along the edge from `pred`.
    pub fn get(&self, phi: InstRef, pred: BlockRef) -> Option<&LiveSet> {
        self.map[phi].get(&pred)
    }

    /// Every `(pred, set)` entry of a phi, ordered by block.
    pub fn entries(&self, phi: InstRef) -> impl Iterator<Item = (BlockRef, &LiveSet)> + '_ {
        self.map[phi].iter().map(|(&b, set)| (b, set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadwood_ir::parser::parse_test_function;

    fn block(func: &Function, label: &str) -> BlockRef {
        func.layout()
            .iter()
            .copied()
            .find(|&b| func.block_label(b) == Some(label))
            .unwrap()
    }

    fn value(func: &Function, name: &str) -> deadwood_ir::ValueRef {
        func.values().find(|&v| func.value_name(v) == Some(name)).unwrap()
    }

    #[test]
    fn single_phi_maps_each_edge_to_its_value() {
        let func = parse_test_function(
            r#"
func @f(%a, %b, %c) {
  ^entry:
    condbr %c [^l, ^r]
  ^l:
    br [^j]
  ^r:
    br [^j]
  ^j:
    %p = phi [%a, ^l], [%b, ^r]
    ret %p
}
"#,
        );
        let phis = PhiIncomingMap::compute(&func);
        let j = block(&func, "j");
        let p = func.first_inst(j).unwrap();

        let from_l: Vec<_> = phis.get(p, block(&func, "l")).unwrap().iter().collect();
        let from_r: Vec<_> = phis.get(p, block(&func, "r")).unwrap().iter().collect();
        assert_eq!(from_l, vec![value(&func, "a")]);
        assert_eq!(from_r, vec![value(&func, "b")]);
        assert!(phis.get(p, block(&func, "entry")).is_none());
    }

    #[test]
    fn leading_phis_accumulate_into_first() {
        let func = parse_test_function(
            r#"
func @f(%a, %b) {
  ^entry:
    br [^head]
  ^head:
    %x = phi [%a, ^entry], [%y, ^head]
    %y = phi [%b, ^entry], [7, ^head]
    condbr %x [^head, ^exit]
  ^exit:
    ret %y
}
"#,
        );
        let phis = PhiIncomingMap::compute(&func);
        let entry = block(&func, "entry");
        let head = block(&func, "head");
        let x = func.first_inst(head).unwrap();
        let y = func.next_inst(x).unwrap();

        let first_from_entry: Vec<_> = phis.get(x, entry).unwrap().iter().collect();
        assert_eq!(first_from_entry, vec![value(&func, "a"), value(&func, "b")]);

        let second_from_entry: Vec<_> = phis.get(y, entry).unwrap().iter().collect();
        assert_eq!(second_from_entry, vec![value(&func, "b")]);

        // Immediates contribute nothing but still record the edge.
        assert!(phis.get(y, head).unwrap().is_empty());
        assert_eq!(phis.entries(x).count(), 2);
    }
}
