//! Drawing event model
//!
//! A board is an append-only log of [`DrawEvent`]s. Every mutation of the
//! visible canvas (strokes, shapes, text, deletions, clears) is one event.
//! Events are immutable once the server assigns them a `seq`; the canvas
//! state at any `seq = S` is the folded replay of events `1..=S`.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

/// A point in board (world) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Freehand stroke: a polyline with a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePayload {
    pub stroke_id: String,
    pub color: String,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    pub points: Vec<Point>,
}

/// Geometric shape kind for [`ShapePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Line,
}

/// A rectangle, ellipse, or straight line between two corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePayload {
    pub stroke_id: String,
    pub shape_type: ShapeKind,
    pub start: Point,
    pub end: Point,
    pub color: String,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

/// A text block anchored at a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPayload {
    pub stroke_id: String,
    pub text: String,
    pub position: Point,
    pub color: String,
    pub font_size: f64,
}

/// Removal of previously drawn strokes by id. Unknown ids are a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePayload {
    pub stroke_ids: Vec<String>,
}

/// The payload union of a drawing event.
///
/// Wire shape is `{ "type": "stroke" | "shape" | "text" | "delete" | "clear",
/// "payload": { … } }`; `clear` carries no payload. Serialization is
/// implemented by hand so that a missing or empty `payload` on `clear` is
/// accepted, which derived adjacent tagging does not allow.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Stroke(StrokePayload),
    Shape(ShapePayload),
    Text(TextPayload),
    Delete(DeletePayload),
    Clear,
}

impl EventBody {
    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stroke(_) => "stroke",
            Self::Shape(_) => "shape",
            Self::Text(_) => "text",
            Self::Delete(_) => "delete",
            Self::Clear => "clear",
        }
    }

    /// Build a body from the wire `type` tag and its raw payload.
    pub fn from_parts(kind: &str, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        match kind {
            "stroke" => Ok(Self::Stroke(serde_json::from_value(payload)?)),
            "shape" => Ok(Self::Shape(serde_json::from_value(payload)?)),
            "text" => Ok(Self::Text(serde_json::from_value(payload)?)),
            "delete" => Ok(Self::Delete(serde_json::from_value(payload)?)),
            "clear" => Ok(Self::Clear),
            other => Err(serde_json::Error::custom(format!(
                "unknown draw event type: {other}"
            ))),
        }
    }
}

impl Serialize for EventBody {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = match self {
            Self::Clear => 1,
            _ => 2,
        };
        let mut map = serializer.serialize_map(Some(entries))?;
        map.serialize_entry("type", self.kind())?;
        match self {
            Self::Stroke(p) => map.serialize_entry("payload", p)?,
            Self::Shape(p) => map.serialize_entry("payload", p)?,
            Self::Text(p) => map.serialize_entry("payload", p)?,
            Self::Delete(p) => map.serialize_entry("payload", p)?,
            Self::Clear => {}
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventBody {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            payload: serde_json::Value,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::from_parts(&raw.kind, raw.payload).map_err(D::Error::custom)
    }
}

/// A server-ordered canvas mutation.
///
/// `seq` is strictly monotonically increasing per board with no gaps and is
/// the only canonical ordering. `timestamp` is server wall-clock milliseconds
/// and may be non-monotonic under clock adjustment; consumers must not order
/// by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawEvent {
    pub board_id: String,
    pub seq: i64,
    pub user_id: String,
    /// Server wall-clock milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub body: EventBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroke_body_parses_camel_case_fields() {
        let json = serde_json::json!({
            "type": "stroke",
            "payload": {
                "strokeId": "s1",
                "color": "#ff0000",
                "width": 4.0,
                "points": [{"x": 1.0, "y": 2.0}, {"x": 3.0, "y": 4.0}]
            }
        });
        let body: EventBody = serde_json::from_value(json).unwrap();
        match body {
            EventBody::Stroke(s) => {
                assert_eq!(s.stroke_id, "s1");
                assert_eq!(s.points.len(), 2);
                assert!(s.opacity.is_none());
            }
            other => panic!("expected stroke, got {other:?}"),
        }
    }

    #[test]
    fn clear_accepts_missing_and_empty_payload() {
        let bare: EventBody = serde_json::from_value(serde_json::json!({"type": "clear"})).unwrap();
        assert_eq!(bare, EventBody::Clear);

        let empty: EventBody =
            serde_json::from_value(serde_json::json!({"type": "clear", "payload": {}})).unwrap();
        assert_eq!(empty, EventBody::Clear);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let json = serde_json::json!({"type": "scribble", "payload": {}});
        assert!(serde_json::from_value::<EventBody>(json).is_err());
    }

    #[test]
    fn draw_event_flattens_body_into_frame() {
        let event = DrawEvent {
            board_id: "b1".into(),
            seq: 7,
            user_id: "u1".into(),
            timestamp: 1_700_000_000_000,
            body: EventBody::Delete(DeletePayload {
                stroke_ids: vec!["s1".into(), "s2".into()],
            }),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["boardId"], "b1");
        assert_eq!(value["seq"], 7);
        assert_eq!(value["type"], "delete");
        assert_eq!(value["payload"]["strokeIds"][1], "s2");

        let back: DrawEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn shape_kind_uses_lowercase_names() {
        let json = serde_json::json!({
            "type": "shape",
            "payload": {
                "strokeId": "s9",
                "shapeType": "ellipse",
                "start": {"x": 0.0, "y": 0.0},
                "end": {"x": 10.0, "y": 20.0},
                "color": "#00ff00",
                "width": 2.0
            }
        });
        let body: EventBody = serde_json::from_value(json).unwrap();
        match body {
            EventBody::Shape(s) => assert_eq!(s.shape_type, ShapeKind::Ellipse),
            other => panic!("expected shape, got {other:?}"),
        }
    }
}
