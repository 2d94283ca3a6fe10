pub mod dismiss;
