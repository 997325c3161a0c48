mod alert;
mod region;
mod risk;
mod vessel;

pub use alert::*;
pub use region::*;
pub use risk::*;
pub use vessel::*;
