mod button;
mod embassy_button;
mod input_line;
mod timer_service;

pub use button::*;
pub use embassy_button::*;
pub use input_line::*;
pub use timer_service::*;
