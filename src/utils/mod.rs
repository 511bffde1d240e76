mod macro_for_unit_test;

#[allow(unused_imports)]
pub use macro_for_unit_test::*;
