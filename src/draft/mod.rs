// Draft engine: order generation, turn tracking, pick validation, auto-pick.

pub mod autopick;
pub mod order;
pub mod submit;
pub mod turn;
