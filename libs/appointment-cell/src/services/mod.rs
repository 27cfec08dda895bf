pub mod booking;
pub mod email;
pub mod lifecycle;
pub mod locks;
pub mod slots;
