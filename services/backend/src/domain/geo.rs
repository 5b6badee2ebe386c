// 位置情報と距離計算
//
// アイテムのdata_valuesに含まれる緯度経度から、基準地点までの
// 大圏距離（haversine）を求めて近い順に並べる。

use serde_json::Value;
use thiserror::Error;

/// 地球の半径（キロメートル）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 近傍検索で返すアイテム数
pub const NEAREST_ITEM_COUNT: usize = 5;

/// data_values内の緯度キー（日本語 / 英語）
const LATITUDE_KEYS: [&str; 2] = ["緯度", "latitude"];

/// data_values内の経度キー（日本語 / 英語）
const LONGITUDE_KEYS: [&str; 2] = ["経度", "longitude"];

/// 座標検証エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude out of range: {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
}

/// 緯度経度（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// 検証付きで座標を作成
    ///
    /// 緯度は±90、経度は±180の範囲内の有限値である必要がある。
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// data_values（JSONオブジェクト）から座標を取り出す
    ///
    /// 数値または数値文字列を受け付ける。欠落・不正な場合はNone。
    pub fn from_data_values(data_values: &Value) -> Option<Self> {
        let latitude = lookup_number(data_values, &LATITUDE_KEYS)?;
        let longitude = lookup_number(data_values, &LONGITUDE_KEYS)?;
        Self::new(latitude, longitude).ok()
    }

    /// 他の座標までの距離（km）
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self, other)
    }
}

fn lookup_number(data_values: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| data_values.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
}

/// 2点間の大圏距離（km）
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// 基準地点から近い順に最大`limit`件を返す
///
/// 距離が同じ場合は入力順を保つ。
pub fn nearest<T>(
    origin: &Coordinates,
    candidates: Vec<(T, Coordinates)>,
    limit: usize,
) -> Vec<(T, f64)> {
    let mut with_distance: Vec<(T, f64)> = candidates
        .into_iter()
        .map(|(item, coordinates)| {
            let distance = origin.distance_km(&coordinates);
            (item, distance)
        })
        .collect();

    with_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
    with_distance.truncate(limit);
    with_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coords(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates::new(latitude, longitude).unwrap()
    }

    // ==================== 座標検証テスト ====================

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(35.68, 139.76).is_ok());
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinates::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinates::new(0.0, 181.0),
            Err(CoordinateError::LongitudeOutOfRange(181.0))
        );
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_from_data_values_japanese_keys() {
        let values = json!({"名称": "中央公園", "緯度": 35.1, "経度": "136.9"});
        assert_eq!(Coordinates::from_data_values(&values), Some(coords(35.1, 136.9)));
    }

    #[test]
    fn test_from_data_values_english_keys() {
        let values = json!({"latitude": "34.5", "longitude": 135.5});
        assert_eq!(Coordinates::from_data_values(&values), Some(coords(34.5, 135.5)));
    }

    #[test]
    fn test_from_data_values_missing_or_invalid() {
        assert_eq!(Coordinates::from_data_values(&json!({"緯度": 35.0})), None);
        assert_eq!(
            Coordinates::from_data_values(&json!({"緯度": "北", "経度": 135.0})),
            None
        );
        assert_eq!(
            Coordinates::from_data_values(&json!({"緯度": 135.0, "経度": 35.0})),
            None
        );
        assert_eq!(Coordinates::from_data_values(&json!(null)), None);
    }

    // ==================== 距離計算テスト ====================

    #[test]
    fn test_haversine_same_point_is_zero() {
        let p = coords(35.0, 135.0);
        assert!(haversine_km(&p, &p).abs() < 1e-9);
    }

    /// 東京駅から大阪駅までおよそ403km
    #[test]
    fn test_haversine_tokyo_osaka() {
        let tokyo = coords(35.6812, 139.7671);
        let osaka = coords(34.7025, 135.4959);
        let distance = haversine_km(&tokyo, &osaka);
        assert!((distance - 403.0).abs() < 5.0, "distance = {distance}");
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let distance = haversine_km(&coords(0.0, 0.0), &coords(1.0, 0.0));
        assert!((distance - 111.19).abs() < 0.1, "distance = {distance}");
    }

    // ==================== 近傍選択テスト ====================

    #[test]
    fn test_nearest_sorts_and_truncates() {
        let origin = coords(35.0, 135.0);
        let candidates = vec![
            ("far", coords(36.0, 135.0)),
            ("near", coords(35.01, 135.0)),
            ("middle", coords(35.5, 135.0)),
        ];

        let result = nearest(&origin, candidates, 2);
        let names: Vec<&str> = result.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["near", "middle"]);
        assert!(result[0].1 < result[1].1);
    }

    #[test]
    fn test_nearest_with_fewer_candidates_than_limit() {
        let origin = coords(0.0, 0.0);
        let result = nearest(&origin, vec![(1, coords(0.0, 1.0))], NEAREST_ITEM_COUNT);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_nearest_keeps_input_order_on_ties() {
        let origin = coords(0.0, 0.0);
        let candidates = vec![
            ("a", coords(0.0, 1.0)),
            ("b", coords(0.0, -1.0)),
            ("c", coords(1.0, 0.0)),
        ];
        let result = nearest(&origin, candidates, 3);
        assert_eq!(result[0].0, "a");
        assert_eq!(result[1].0, "b");
    }
}
