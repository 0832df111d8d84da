pub mod text;
pub mod subchunk;
pub mod chunk;
