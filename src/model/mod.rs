pub mod game_state;
pub mod message;
pub mod status_record;
pub mod turn;
