pub mod ast;
pub mod capture;
pub mod exclusion;
pub mod watermark;
