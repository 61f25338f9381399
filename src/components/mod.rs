pub mod paginator;
pub mod rps_view;
pub mod search_select;
pub mod tictactoe_view;
pub mod wordle_view;
