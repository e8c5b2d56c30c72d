// File I/O operations

pub mod xlsx;
pub mod xlsx_styles;
