//! Board state and the match state machine.

mod machine;
pub mod rules;
mod tile;
mod types;

pub use machine::{MatchError, MatchMachine, Phase, PlacedMove, TurnTransition};
pub use rules::Outcome;
pub use tile::{Tile, TileOutOfRange};
pub use types::{Board, BoardError, Cell, Mark};

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in_progress() -> MatchMachine {
        let mut machine = MatchMachine::new();
        machine.start(Mark::X).expect("fresh machine starts");
        machine
    }

    #[test]
    fn apply_changes_exactly_one_cell() {
        let board = Board::new();
        let next = board.apply(Tile::Center, Mark::X).expect("empty cell");

        assert_eq!(next.cell(Tile::Center), Cell::Marked(Mark::X));
        let untouched = Tile::ALL
            .iter()
            .filter(|tile| **tile != Tile::Center)
            .all(|tile| next.cell(*tile) == Cell::Empty);
        assert!(untouched);
    }

    #[test]
    fn apply_rejects_occupied_cell() {
        let board = Board::new();
        let board = board.apply(Tile::Center, Mark::X).unwrap();

        let result = board.apply(Tile::Center, Mark::O);
        assert_eq!(result, Err(BoardError::CellOccupied(Tile::Center)));
    }

    #[test]
    fn tile_from_wire_rejects_out_of_range() {
        assert_eq!(Tile::try_from(8), Ok(Tile::BottomRight));
        assert_eq!(Tile::try_from(9), Err(TileOutOfRange(9)));
    }

    #[test]
    fn tile_indices_round_trip() {
        use strum::IntoEnumIterator;

        for (expected, tile) in Tile::iter().enumerate() {
            assert_eq!(tile.index(), expected);
            assert_eq!(Tile::from_index(expected), Some(tile));
        }
    }

    #[test]
    fn move_count_matches_occupied_cells() {
        let mut machine = machine_in_progress();
        let moves = [
            (Tile::TopLeft, Mark::X),
            (Tile::Center, Mark::O),
            (Tile::BottomRight, Mark::X),
            (Tile::TopRight, Mark::O),
        ];
        for (tile, mark) in moves {
            machine.submit(tile, mark).expect("valid move");
        }

        assert_eq!(machine.move_count(), 4);
        assert_eq!(machine.move_count(), machine.board().occupied_count());
    }

    #[test]
    fn start_twice_is_invalid() {
        let mut machine = machine_in_progress();
        assert_eq!(
            machine.start(Mark::X),
            Err(MatchError::InvalidTransition(Phase::InProgress))
        );
    }

    #[test]
    fn submit_before_start_is_not_active() {
        let mut machine = MatchMachine::new();
        assert_eq!(
            machine.submit(Tile::Center, Mark::X),
            Err(MatchError::MatchNotActive)
        );
    }

    #[test]
    fn out_of_turn_submit_leaves_state_unchanged() {
        let mut machine = machine_in_progress();

        let result = machine.submit(Tile::Center, Mark::O);

        assert_eq!(result, Err(MatchError::NotYourTurn(Mark::O)));
        assert_eq!(machine.turn_owner(), Mark::X);
        assert_eq!(machine.move_count(), 0);
        assert_eq!(machine.phase(), Phase::InProgress);
    }

    #[test]
    fn top_row_win_for_x() {
        let mut machine = machine_in_progress();
        let moves = [
            (Tile::TopLeft, Mark::X),
            (Tile::Center, Mark::O),
            (Tile::TopCenter, Mark::X),
            (Tile::MiddleLeft, Mark::O),
        ];
        for (tile, mark) in moves {
            machine.submit(tile, mark).expect("valid move");
        }

        let transition = machine.submit(Tile::TopRight, Mark::X).expect("winning move");

        assert_eq!(
            transition,
            TurnTransition::Ended(Outcome::Winner(Mark::X))
        );
        assert_eq!(machine.phase(), Phase::Ended(Outcome::Winner(Mark::X)));
        // Terminal transition must not advance the turn.
        assert_eq!(machine.turn_owner(), Mark::X);
    }

    #[test]
    fn full_board_with_no_line_is_draw() {
        let mut machine = machine_in_progress();
        // Fill order 0,1,2,3,4,5,7,6,8 alternating from X produces no line.
        let order = [0, 1, 2, 3, 4, 5, 7, 6, 8];
        let mut mark = Mark::X;
        for index in order {
            let tile = Tile::from_index(index).expect("in range");
            machine.submit(tile, mark).expect("valid move");
            mark = mark.opponent();
        }

        assert_eq!(machine.phase(), Phase::Ended(Outcome::Draw));
        assert_eq!(machine.move_count(), 9);
    }

    #[test]
    fn full_and_won_board_reports_winner_not_draw() {
        // X's ninth move both fills the board and completes the bottom row.
        let mut machine = machine_in_progress();
        let moves = [
            (Tile::BottomLeft, Mark::X),
            (Tile::TopLeft, Mark::O),
            (Tile::BottomCenter, Mark::X),
            (Tile::TopRight, Mark::O),
            (Tile::TopCenter, Mark::X),
            (Tile::Center, Mark::O),
            (Tile::MiddleLeft, Mark::X),
            (Tile::MiddleRight, Mark::O),
        ];
        for (tile, mark) in moves {
            machine.submit(tile, mark).expect("valid move");
        }

        let transition = machine
            .submit(Tile::BottomRight, Mark::X)
            .expect("final move");

        assert_eq!(
            transition,
            TurnTransition::Ended(Outcome::Winner(Mark::X))
        );
    }

    #[test]
    fn restart_rejected_mid_match() {
        let mut machine = machine_in_progress();
        machine.submit(Tile::Center, Mark::X).expect("valid move");

        assert_eq!(
            machine.restart(Mark::X),
            Err(MatchError::InvalidTransition(Phase::InProgress))
        );
    }

    #[test]
    fn restart_after_end_resets_board_and_count() {
        let mut machine = machine_in_progress();
        let moves = [
            (Tile::TopLeft, Mark::X),
            (Tile::Center, Mark::O),
            (Tile::TopCenter, Mark::X),
            (Tile::MiddleLeft, Mark::O),
            (Tile::TopRight, Mark::X),
        ];
        for (tile, mark) in moves {
            machine.submit(tile, mark).expect("valid move");
        }
        assert!(machine.phase().is_ended());

        machine.restart(Mark::O).expect("restart from ended");

        assert_eq!(machine.phase(), Phase::InProgress);
        assert_eq!(machine.move_count(), 0);
        assert_eq!(machine.turn_owner(), Mark::O);
        assert_eq!(machine.board().occupied_count(), 0);
    }

    #[test]
    fn reset_abandons_without_outcome() {
        let mut machine = machine_in_progress();
        machine.submit(Tile::Center, Mark::X).expect("valid move");

        machine.reset();

        assert_eq!(machine.phase(), Phase::NotStarted);
        assert_eq!(machine.move_count(), 0);
    }
}
