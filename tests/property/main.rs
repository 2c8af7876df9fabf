// tests/property/main.rs

mod mask_algebra;
mod parity;
