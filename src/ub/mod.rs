pub mod label_guided;
