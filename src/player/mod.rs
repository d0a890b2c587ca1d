pub mod cpu;
pub mod human;

pub use cpu::CpuPlayer;
pub use human::{parse_column, read_move};
