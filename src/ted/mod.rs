pub mod zhang_shasha;
