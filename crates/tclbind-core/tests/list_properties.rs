//! Property tests for the list text format and value cells.

use proptest::prelude::*;
use tclbind_core::{Interp, Obj, list};

proptest! {
    #[test]
    fn format_then_parse(elements in prop::collection::vec("[ -~]{0,10}", 0..10)) {
        let text = list::format(&elements);
        prop_assert_eq!(list::parse(&text).unwrap(), elements);
    }

    #[test]
    fn list_cells_stringify_and_reparse(elements in prop::collection::vec("[a-z{} \\\\]{0,5}", 0..6)) {
        let cell = Obj::from_list(elements.iter().map(|e| Obj::from(e.as_str())).collect());
        let reparsed = Obj::from(cell.as_string());
        let back: Vec<String> = reparsed
            .list_elements()
            .unwrap()
            .iter()
            .map(Obj::as_string)
            .collect();
        prop_assert_eq!(back, elements);
    }

    #[test]
    fn lappend_leaves_other_holders_alone(base in prop::collection::vec("[a-z]{1,4}", 0..5), extra in "[a-z]{1,4}") {
        let interp = Interp::new();
        interp.set_var("a", Obj::from_list(base.iter().map(|e| Obj::from(e.as_str())).collect()));
        interp.eval("set b $a").unwrap();
        interp.eval(&format!("lappend b {extra}")).unwrap();
        prop_assert_eq!(interp.get_var("a").unwrap().list_len().unwrap(), base.len());
        prop_assert_eq!(interp.get_var("b").unwrap().list_len().unwrap(), base.len() + 1);
    }

    #[test]
    fn integer_text_round_trip(value in any::<i32>()) {
        let cell = Obj::from(value.to_string());
        prop_assert_eq!(cell.get_int().unwrap(), i64::from(value));
    }
}
