pub mod rps;
pub mod tictactoe;
pub mod wordle;
pub mod words;
