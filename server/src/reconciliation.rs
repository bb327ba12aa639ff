//! Rewind-apply-replay correction for late key events.
//!
//! A client stamps every key event with the frame it was showing when the
//! key changed. By the time the event reaches the simulation the server may
//! already be a few frames further. Reconciling moves the player back to the
//! reported frame, applies the key there and replays the skipped frames so
//! the trajectory bends where the player actually pressed the key.
//!
//! Replay only corrects position and heading. Trail cells painted and deaths
//! resolved in the meantime are not revisited.

use log::debug;
use shared::{KeyInput, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The input was applied `rewound` frames in the past
    Applied { rewound: u32 },
    /// The frame was already reconciled for this player
    Stale,
    /// The frame has not been simulated yet
    Future,
}

/// Returns true if an input reported for `reported_frame` can be replayed.
pub fn in_window(player: &Player, reported_frame: u32, current_frame: u32) -> bool {
    reported_frame > player.latest_game_frame && reported_frame <= current_frame
}

/// Replays `input` as if it had happened at `reported_frame`.
///
/// Inputs outside the window `(latest_game_frame, current_frame]` leave the
/// player untouched.
pub fn reconcile(
    player: &mut Player,
    input: KeyInput,
    reported_frame: u32,
    current_frame: u32,
) -> Reconciliation {
    if !in_window(player, reported_frame, current_frame) {
        return if reported_frame > current_frame {
            Reconciliation::Future
        } else {
            Reconciliation::Stale
        };
    }

    let diff = current_frame - reported_frame;

    for _ in 0..diff {
        player.process_frame_backwards();
    }

    player.apply_input(input);

    for _ in 0..diff {
        player.process_frame();
    }

    player.latest_game_frame = reported_frame;

    debug!(
        "Player {} input {:?} reconciled {} frames back",
        player.id, input, diff
    );

    Reconciliation::Applied { rewound: diff }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{BoardConfig, Key, PlayerInfo};

    fn test_player() -> Player {
        let mut player = Player::new(
            1,
            PlayerInfo {
                name: "p".to_string(),
                color: "red".to_string(),
            },
        );
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        player.reset(&BoardConfig::default(), &mut rng);
        player.x = 400.0;
        player.y = 300.0;
        player
    }

    #[test]
    fn test_rejects_stale_frames() {
        let mut player = test_player();
        player.latest_game_frame = 10;
        let before = (player.x, player.y, player.movement_angle);

        let result = reconcile(&mut player, KeyInput::Down(Key::Left), 10, 20);

        assert_eq!(result, Reconciliation::Stale);
        assert_eq!(player.latest_game_frame, 10);
        assert_eq!((player.x, player.y, player.movement_angle), before);
        assert!(!player.left_pressed);
    }

    #[test]
    fn test_rejects_future_frames() {
        let mut player = test_player();
        let result = reconcile(&mut player, KeyInput::Down(Key::Left), 21, 20);
        assert_eq!(result, Reconciliation::Future);
        assert_eq!(player.latest_game_frame, 0);
    }

    #[test]
    fn test_current_frame_applies_without_rewind() {
        let mut player = test_player();
        let (x, y) = (player.x, player.y);

        let result = reconcile(&mut player, KeyInput::Down(Key::Right), 20, 20);

        assert_eq!(result, Reconciliation::Applied { rewound: 0 });
        assert!(player.right_pressed);
        assert_eq!((player.x, player.y), (x, y));
        assert_eq!(player.latest_game_frame, 20);
    }

    #[test]
    fn test_rewinds_and_replays() {
        let current = 50;
        let mut player = test_player();
        player.latest_game_frame = current - 5;

        let mut expected = player.clone();
        for _ in 0..3 {
            expected.process_frame_backwards();
        }
        expected.left_pressed = true;
        for _ in 0..3 {
            expected.process_frame();
        }

        let result = reconcile(&mut player, KeyInput::Down(Key::Left), current - 3, current);

        assert_eq!(result, Reconciliation::Applied { rewound: 3 });
        assert_eq!(player.latest_game_frame, current - 3);
        assert!(player.left_pressed);
        assert_approx_eq!(player.x, expected.x);
        assert_approx_eq!(player.y, expected.y);
        assert_approx_eq!(player.movement_angle, -3.0 * player.turn_speed());
    }

    #[test]
    fn test_latest_frame_never_decreases() {
        let mut player = test_player();
        let frames = [5, 3, 9, 9, 2, 12, 11];
        let mut last = 0;

        for frame in frames {
            reconcile(&mut player, KeyInput::Up(Key::Left), frame, 15);
            assert!(player.latest_game_frame >= last);
            last = player.latest_game_frame;
        }

        assert_eq!(player.latest_game_frame, 12);
    }

    #[test]
    fn test_window() {
        let mut player = test_player();
        player.latest_game_frame = 4;
        assert!(!in_window(&player, 4, 10));
        assert!(in_window(&player, 5, 10));
        assert!(in_window(&player, 10, 10));
        assert!(!in_window(&player, 11, 10));
    }
}
