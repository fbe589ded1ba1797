pub mod state;
pub mod table;

pub use state::GenerationSession;
pub use table::GenerationTable;
