//! Tic-Tac-Toe board. Cells hold 0 (empty), -1 (X) or +1 (O) so a full
//! line is detected by its sum.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn value(&self) -> i8 {
        match self {
            Mark::X => -1,
            Mark::O => 1,
        }
    }

    pub fn other(&self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Mark),
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("The game is already over")]
    GameOver,
    #[error("You are not part of this game")]
    NotAPlayer,
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("That cell is already taken")]
    Occupied,
    #[error("That cell is outside the board")]
    OutOfBounds,
}

#[derive(Debug, Clone)]
pub struct TicTacToe {
    board: [[i8; 3]; 3],
    turn: Mark,
    x_player: Option<u64>,
    o_player: Option<u64>,
    /// Users allowed to take a side; empty means anyone
    allowed: Vec<u64>,
    outcome: Option<Outcome>,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self::with_players(Vec::new())
    }

    /// Restrict seats to the given users (the challenger and the challenged)
    pub fn with_players(allowed: Vec<u64>) -> Self {
        Self {
            board: [[0; 3]; 3],
            turn: Mark::X,
            x_player: None,
            o_player: None,
            allowed,
            outcome: None,
        }
    }

    pub fn board(&self) -> &[[i8; 3]; 3] {
        &self.board
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Mark> {
        match self.board.get(row)?.get(col)? {
            -1 => Some(Mark::X),
            1 => Some(Mark::O),
            _ => None,
        }
    }

    pub fn turn(&self) -> Mark {
        self.turn
    }

    pub fn player(&self, mark: Mark) -> Option<u64> {
        match mark {
            Mark::X => self.x_player,
            Mark::O => self.o_player,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Winner's user id, `None` for a draw or a running game
    pub fn winner_id(&self) -> Option<u64> {
        match self.outcome {
            Some(Outcome::Win(mark)) => self.player(mark),
            _ => None,
        }
    }

    /// Side the user plays, binding them to the side to move if it is still free
    fn seat(&mut self, user: u64) -> Result<Mark, MoveError> {
        if self.x_player == Some(user) {
            return Ok(Mark::X);
        }
        if self.o_player == Some(user) {
            return Ok(Mark::O);
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&user) {
            return Err(MoveError::NotAPlayer);
        }

        let free = match self.turn {
            Mark::X => &mut self.x_player,
            Mark::O => &mut self.o_player,
        };
        match free {
            Some(_) => Err(MoveError::NotAPlayer),
            None => {
                *free = Some(user);
                Ok(self.turn)
            }
        }
    }

    pub fn play(&mut self, user: u64, row: usize, col: usize) -> Result<Option<Outcome>, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        if row > 2 || col > 2 {
            return Err(MoveError::OutOfBounds);
        }
        if self.board[row][col] != 0 {
            return Err(MoveError::Occupied);
        }

        let mark = self.seat(user)?;
        if mark != self.turn {
            return Err(MoveError::NotYourTurn);
        }

        self.board[row][col] = mark.value();
        self.outcome = self.evaluate();
        if self.outcome.is_none() {
            self.turn = mark.other();
        }

        Ok(self.outcome)
    }

    fn lines(&self) -> [i8; 8] {
        let b = &self.board;
        [
            b[0][0] + b[0][1] + b[0][2],
            b[1][0] + b[1][1] + b[1][2],
            b[2][0] + b[2][1] + b[2][2],
            b[0][0] + b[1][0] + b[2][0],
            b[0][1] + b[1][1] + b[2][1],
            b[0][2] + b[1][2] + b[2][2],
            b[0][0] + b[1][1] + b[2][2],
            b[0][2] + b[1][1] + b[2][0],
        ]
    }

    fn evaluate(&self) -> Option<Outcome> {
        for sum in self.lines() {
            match sum {
                -3 => return Some(Outcome::Win(Mark::X)),
                3 => return Some(Outcome::Win(Mark::O)),
                _ => {}
            }
        }

        if self.board.iter().flatten().all(|c| *c != 0) {
            Some(Outcome::Draw)
        } else {
            None
        }
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: u64 = 1;
    const BOB: u64 = 2;
    const CAROL: u64 = 3;

    #[test]
    fn test_diagonal_win() {
        let mut game = TicTacToe::new();
        assert_eq!(game.play(ALICE, 0, 0), Ok(None));
        assert_eq!(game.play(BOB, 0, 1), Ok(None));
        assert_eq!(game.play(ALICE, 1, 1), Ok(None));
        assert_eq!(game.play(BOB, 0, 2), Ok(None));
        assert_eq!(game.play(ALICE, 2, 2), Ok(Some(Outcome::Win(Mark::X))));

        let b = game.board();
        assert_eq!(b[0][0] + b[1][1] + b[2][2], -3);
        assert_eq!(game.winner_id(), Some(ALICE));
        assert_eq!(game.play(BOB, 2, 0), Err(MoveError::GameOver));
    }

    #[test]
    fn test_sides_bind_lazily() {
        let mut game = TicTacToe::new();
        assert_eq!(game.player(Mark::X), None);
        game.play(ALICE, 0, 0).unwrap();
        assert_eq!(game.player(Mark::X), Some(ALICE));
        assert_eq!(game.player(Mark::O), None);

        assert_eq!(game.play(ALICE, 1, 1), Err(MoveError::NotYourTurn));
        game.play(BOB, 1, 1).unwrap();
        assert_eq!(game.player(Mark::O), Some(BOB));

        assert_eq!(game.play(CAROL, 2, 2), Err(MoveError::NotAPlayer));
        assert_eq!(game.play(BOB, 2, 2), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_restricted_seats() {
        let mut game = TicTacToe::with_players(vec![ALICE, BOB]);
        assert_eq!(game.play(CAROL, 0, 0), Err(MoveError::NotAPlayer));
        game.play(BOB, 0, 0).unwrap();
        assert_eq!(game.player(Mark::X), Some(BOB));
    }

    #[test]
    fn test_occupied_cell_does_not_consume_turn() {
        let mut game = TicTacToe::new();
        game.play(ALICE, 0, 0).unwrap();
        assert_eq!(game.play(BOB, 0, 0), Err(MoveError::Occupied));
        assert_eq!(game.turn(), Mark::O);
        assert_eq!(game.player(Mark::O), None);
    }

    #[test]
    fn test_draw() {
        let mut game = TicTacToe::new();
        // X O X / X O O / O X X
        let moves = [
            (ALICE, 0, 0),
            (BOB, 0, 1),
            (ALICE, 0, 2),
            (BOB, 1, 1),
            (ALICE, 1, 0),
            (BOB, 1, 2),
            (ALICE, 2, 1),
            (BOB, 2, 0),
        ];
        for (user, r, c) in moves {
            assert_eq!(game.play(user, r, c), Ok(None));
        }
        assert_eq!(game.play(ALICE, 2, 2), Ok(Some(Outcome::Draw)));
        assert_eq!(game.winner_id(), None);
    }
}
