//! Text encoding of socket frames.
//!
//! Control frames are JSON; direction frames are plain text tokens:
//! a bare integer code for snake, `"<direction> <unix_seconds>"` for pong.

use std::str::FromStr;

use crate::{
    error::ProtoError,
    messages::{
        game::{PaddleDirection, SessionId, SnakeDirection},
        socket::{Handshake, InboundMessage},
    },
};

pub fn encode_handshake(session_id: SessionId) -> Result<String, ProtoError> {
    Ok(serde_json::to_string(&Handshake {
        playlist_video_id: session_id,
    })?)
}

pub fn decode_handshake(text: &str) -> Result<Handshake, ProtoError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_inbound(text: &str) -> Result<InboundMessage, ProtoError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_snake_direction(direction: SnakeDirection) -> String {
    direction.code().to_string()
}

/// The timestamp lets the server reconcile paddle moves against latency.
pub fn encode_paddle_direction(direction: PaddleDirection, unix_seconds: f64) -> String {
    format!("{direction} {unix_seconds}")
}

/// A decoded client direction frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionToken {
    Snake(SnakeDirection),
    Paddle {
        direction: PaddleDirection,
        sent_at: f64,
    },
}

pub fn decode_direction(text: &str) -> Result<DirectionToken, ProtoError> {
    let bad = || ProtoError::BadDirection(text.to_string());
    let mut parts = text.split_whitespace();
    let head = parts.next().ok_or_else(bad)?;

    if let Ok(code) = head.parse::<u8>() {
        if parts.next().is_some() {
            return Err(bad());
        }
        return SnakeDirection::from_repr(code)
            .map(DirectionToken::Snake)
            .ok_or_else(bad);
    }

    let direction = PaddleDirection::from_str(head).map_err(|_| bad())?;
    let sent_at = parts
        .next()
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(DirectionToken::Paddle { direction, sent_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::socket::{GameOver, PlayerIndex, ScoreSnapshot};

    #[test]
    fn handshake_uses_playlist_video_id_field() {
        let text = encode_handshake(SessionId(17)).unwrap();
        assert_eq!(text, r#"{"playlist_video_id":17}"#);
        assert_eq!(decode_handshake(&text).unwrap().playlist_video_id, SessionId(17));
    }

    #[test]
    fn decodes_tagged_messages() {
        assert_eq!(
            decode_inbound(r#"{"message_type":"player_index_message","player_index":1}"#).unwrap(),
            InboundMessage::PlayerIndexMessage(PlayerIndex { player_index: 1 })
        );
        assert_eq!(
            decode_inbound(r#"{"message_type":"game_over","winner":0,"scores":[5,3]}"#).unwrap(),
            InboundMessage::GameOver(GameOver {
                winner: 0,
                scores: vec![5, 3],
            })
        );
        assert_eq!(
            decode_inbound(r#"{"message_type":"multi_player_score","scores":[1,2],"apples_left":4}"#)
                .unwrap(),
            InboundMessage::MultiPlayerScore(ScoreSnapshot {
                scores: vec![1, 2],
                apples_left: Some(4),
            })
        );
    }

    #[test]
    fn unknown_message_type_is_not_an_error() {
        assert_eq!(
            decode_inbound(r#"{"message_type":"confetti","amount":9000}"#).unwrap(),
            InboundMessage::Unknown
        );
    }

    #[test]
    fn missing_tag_is_an_error() {
        assert!(matches!(
            decode_inbound(r#"{"scores":[1]}"#),
            Err(ProtoError::Json(_))
        ));
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(encode_snake_direction(SnakeDirection::Left), "3");
        assert_eq!(
            decode_direction("4").unwrap(),
            DirectionToken::Snake(SnakeDirection::Right)
        );

        let token = encode_paddle_direction(PaddleDirection::Down, 1700000000.25);
        assert_eq!(token, "down 1700000000.25");
        assert_eq!(
            decode_direction(&token).unwrap(),
            DirectionToken::Paddle {
                direction: PaddleDirection::Down,
                sent_at: 1700000000.25,
            }
        );

        assert!(decode_direction("9").is_err());
        assert!(decode_direction("sideways 1.0").is_err());
        assert!(decode_direction("up").is_err());
    }
}
