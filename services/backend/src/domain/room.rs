// ルーム
//
// ルーム作成時にキーバリューストアへ書き込む2種類のレコードと、
// ランダムなルームIDの生成を提供する。

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

/// ルームIDの文字数
pub const ROOM_ID_LENGTH: usize = 16;

/// 未クローズを表すフラグ値
pub const ROOM_NOT_CLOSED: i64 = -1;

/// まだ何もプッシュされていないことを表すID
pub const NO_PUSHED_ID: &str = "-1";

/// 英数字16文字のルームIDを生成
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(ROOM_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// room_statusテーブルのレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub id: String,
    pub closed: i64,
    pub pushed_id: String,
}

impl RoomStatus {
    /// 作成直後の状態
    pub fn opened(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            closed: ROOM_NOT_CLOSED,
            pushed_id: NO_PUSHED_ID.to_string(),
        }
    }
}

/// roomテーブルのレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub empowermenter_id: String,
    pub pushed_id: String,
    pub empowerment_result: i64,
    pub closed: i64,
}

impl Room {
    /// 作成直後のルーム
    pub fn opened(id: impl Into<String>, empowermenter_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            empowermenter_id: empowermenter_id.into(),
            pushed_id: NO_PUSHED_ID.to_string(),
            empowerment_result: 0,
            closed: ROOM_NOT_CLOSED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_room_id_format() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let id = generate_room_id(&mut rng);
            assert_eq!(id.chars().count(), ROOM_ID_LENGTH);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "id = {id}");
        }
    }

    #[test]
    fn test_generate_room_id_varies() {
        let mut rng = StdRng::seed_from_u64(3);
        let first = generate_room_id(&mut rng);
        let second = generate_room_id(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_initial_records() {
        let status = RoomStatus::opened("abc");
        assert_eq!(status.closed, -1);
        assert_eq!(status.pushed_id, "-1");

        let room = Room::opened("abc", "user-1");
        assert_eq!(room.empowermenter_id, "user-1");
        assert_eq!(room.empowerment_result, 0);
        assert_eq!(room.closed, -1);
        assert_eq!(room.pushed_id, "-1");
    }
}
