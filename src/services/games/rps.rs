#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub fn value(&self) -> i8 {
        match self {
            Move::Rock => -1,
            Move::Paper => 0,
            Move::Scissors => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "rock" => Some(Move::Rock),
            "paper" => Some(Move::Paper),
            "scissors" => Some(Move::Scissors),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpsResult {
    Draw,
    /// Winner's user id
    Winner(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpsError {
    #[error("You already made your move")]
    AlreadyPlayed,
    #[error("The game is already over")]
    GameOver,
    #[error("You are not part of this game")]
    NotAPlayer,
}

/// `(m2 - m1) mod 3`: 0 draw, 1 second player, 2 first player
pub fn resolve(first: Move, second: Move) -> i8 {
    (second.value() - first.value()).rem_euclid(3)
}

#[derive(Debug, Clone, Default)]
pub struct RpsGame {
    moves: Vec<(u64, Move)>,
    /// Users allowed to play; empty means the first two to click
    allowed: Vec<u64>,
}

impl RpsGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players(allowed: Vec<u64>) -> Self {
        Self {
            moves: Vec::new(),
            allowed,
        }
    }

    pub fn moves(&self) -> &[(u64, Move)] {
        &self.moves
    }

    pub fn has_played(&self, user: u64) -> bool {
        self.moves.iter().any(|(u, _)| *u == user)
    }

    pub fn is_over(&self) -> bool {
        self.moves.len() == 2
    }

    pub fn result(&self) -> Option<RpsResult> {
        match self.moves.as_slice() {
            [(p1, m1), (p2, m2)] => Some(match resolve(*m1, *m2) {
                0 => RpsResult::Draw,
                1 => RpsResult::Winner(*p2),
                _ => RpsResult::Winner(*p1),
            }),
            _ => None,
        }
    }

    pub fn play(&mut self, user: u64, mv: Move) -> Result<Option<RpsResult>, RpsError> {
        if self.is_over() {
            return Err(RpsError::GameOver);
        }
        if self.has_played(user) {
            return Err(RpsError::AlreadyPlayed);
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&user) {
            return Err(RpsError::NotAPlayer);
        }

        self.moves.push((user, mv));
        Ok(self.result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_beats_rock() {
        assert_eq!(resolve(Move::Rock, Move::Paper), 1);

        let mut game = RpsGame::new();
        assert_eq!(game.play(1, Move::Rock), Ok(None));
        assert_eq!(game.play(2, Move::Paper), Ok(Some(RpsResult::Winner(2))));
    }

    #[test]
    fn test_resolution_table() {
        use Move::*;
        let all = [Rock, Paper, Scissors];
        for a in all {
            assert_eq!(resolve(a, a), 0);
        }
        assert_eq!(resolve(Paper, Scissors), 1);
        assert_eq!(resolve(Scissors, Rock), 1);
        assert_eq!(resolve(Paper, Rock), 2);
        assert_eq!(resolve(Rock, Scissors), 2);
    }

    #[test]
    fn test_cannot_play_both_sides() {
        let mut game = RpsGame::new();
        game.play(1, Move::Rock).unwrap();
        assert_eq!(game.play(1, Move::Paper), Err(RpsError::AlreadyPlayed));
        assert!(!game.is_over());

        assert_eq!(game.play(2, Move::Rock), Ok(Some(RpsResult::Draw)));
        assert_eq!(game.play(3, Move::Rock), Err(RpsError::GameOver));
    }

    #[test]
    fn test_restricted_players() {
        let mut game = RpsGame::with_players(vec![1, 2]);
        assert_eq!(game.play(3, Move::Rock), Err(RpsError::NotAPlayer));
        game.play(2, Move::Scissors).unwrap();
        assert_eq!(game.play(1, Move::Paper), Ok(Some(RpsResult::Winner(2))));
    }
}
