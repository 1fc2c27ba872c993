pub mod damage_map;
pub mod hit;
pub mod pipeline;
