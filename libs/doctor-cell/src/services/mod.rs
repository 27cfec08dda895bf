pub mod doctor;
pub mod specialty;
