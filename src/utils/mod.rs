pub mod pagination;
pub mod regex;
