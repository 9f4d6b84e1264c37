//! Input events handed to the delivery subsystem
//!
//! Events are produced upstream (after any coalescing or resampling) and are
//! immutable from here on. The transport decides how each kind is put on the
//! wire; this module only describes them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Maximum number of contact points carried by one touch event
pub const MAX_TOUCH_POINTS: usize = 16;

bitflags! {
    /// Keyboard modifier state at the time of the event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u32 {
        /// Either shift key
        const SHIFT = 1 << 0;
        /// Caps lock engaged
        const CAPS_LOCK = 1 << 1;
        /// Either control key
        const CTRL = 1 << 2;
        /// Either alt key
        const ALT = 1 << 3;
        /// Either meta/super key
        const META = 1 << 4;
        /// Num lock engaged
        const NUM_LOCK = 1 << 5;
        /// Scroll lock engaged
        const SCROLL_LOCK = 1 << 6;
    }
}

bitflags! {
    /// Pointer buttons held at the time of the event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PointerButtons: u32 {
        /// Primary (left) button
        const PRIMARY = 1 << 0;
        /// Secondary (right) button
        const SECONDARY = 1 << 1;
        /// Tertiary (middle) button
        const TERTIARY = 1 << 2;
        /// Back button
        const BACK = 1 << 3;
        /// Forward button
        const FORWARD = 1 << 4;
    }
}

/// Kind of input event, used to pick the wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Keyboard event (published as a key message)
    Key,
    /// Touch event (published as a motion message)
    Touch,
    /// Pointer event (published as a motion message)
    Pointer,
}

impl EventKind {
    /// Whether events of this kind use the motion encoding
    pub fn is_motion(self) -> bool {
        matches!(self, EventKind::Touch | EventKind::Pointer)
    }
}

/// Keyboard action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    /// Key pressed
    Down,
    /// Key released
    Up,
    /// Key held, auto-repeat
    Repeat,
}

/// Keyboard event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Originating device
    pub device_id: i32,
    /// Press, release or repeat
    pub action: KeyAction,
    /// Translated key code (XKB keysym space)
    pub key_code: i32,
    /// Hardware scan code
    pub scan_code: i32,
    /// Modifier state
    pub modifiers: Modifiers,
    /// Monotonic event time in nanoseconds
    pub timestamp_ns: u64,
}

/// Touch point action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TouchAction {
    /// Contact started
    Down,
    /// Contact ended
    Up,
    /// Contact moved
    Change,
}

/// Tool that produced a touch contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolType {
    /// Tool could not be determined
    Unknown,
    /// Finger
    Finger,
    /// Stylus
    Stylus,
}

/// One contact of a touch event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Contact id, stable for the lifetime of the contact
    pub id: i32,
    /// What happened to this contact
    pub action: TouchAction,
    /// Tool type
    pub tool: ToolType,
    /// Surface-local x
    pub x: f32,
    /// Surface-local y
    pub y: f32,
    /// Major axis of the contact ellipse
    pub touch_major: f32,
    /// Minor axis of the contact ellipse
    pub touch_minor: f32,
    /// Contact size
    pub size: f32,
    /// Contact pressure
    pub pressure: f32,
}

/// Multi-point touch event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    /// Originating device
    pub device_id: i32,
    /// Modifier state
    pub modifiers: Modifiers,
    /// Contacts, at least one and at most [`MAX_TOUCH_POINTS`]
    pub points: Vec<TouchPoint>,
    /// Monotonic event time in nanoseconds
    pub timestamp_ns: u64,
}

/// Pointer action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerAction {
    /// A button went down
    ButtonDown,
    /// A button went up
    ButtonUp,
    /// Pointer entered the surface
    Enter,
    /// Pointer left the surface
    Leave,
    /// Pointer moved or scrolled
    Motion,
}

/// Pointer event with absolute, scroll and relative axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Originating device
    pub device_id: i32,
    /// What happened
    pub action: PointerAction,
    /// Buttons currently held
    pub buttons: PointerButtons,
    /// Modifier state
    pub modifiers: Modifiers,
    /// Surface-local x
    pub x: f32,
    /// Surface-local y
    pub y: f32,
    /// Horizontal scroll
    pub hscroll: f32,
    /// Vertical scroll
    pub vscroll: f32,
    /// Unaccelerated relative x motion
    pub relative_x: f32,
    /// Unaccelerated relative y motion
    pub relative_y: f32,
    /// Monotonic event time in nanoseconds
    pub timestamp_ns: u64,
}

/// An input event addressed to one surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Keyboard
    Key(KeyEvent),
    /// Touch
    Touch(TouchEvent),
    /// Pointer
    Pointer(PointerEvent),
}

impl InputEvent {
    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::Key(_) => EventKind::Key,
            InputEvent::Touch(_) => EventKind::Touch,
            InputEvent::Pointer(_) => EventKind::Pointer,
        }
    }

    /// Monotonic event time in nanoseconds
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            InputEvent::Key(e) => e.timestamp_ns,
            InputEvent::Touch(e) => e.timestamp_ns,
            InputEvent::Pointer(e) => e.timestamp_ns,
        }
    }

    /// Originating device
    pub fn device_id(&self) -> i32 {
        match self {
            InputEvent::Key(e) => e.device_id,
            InputEvent::Touch(e) => e.device_id,
            InputEvent::Pointer(e) => e.device_id,
        }
    }

    /// Convenience constructor for a key press/release
    pub fn key(action: KeyAction, key_code: i32, scan_code: i32, timestamp_ns: u64) -> Self {
        InputEvent::Key(KeyEvent {
            device_id: 0,
            action,
            key_code,
            scan_code,
            modifiers: Modifiers::empty(),
            timestamp_ns,
        })
    }

    /// Convenience constructor for plain pointer motion
    pub fn pointer_motion(x: f32, y: f32, timestamp_ns: u64) -> Self {
        InputEvent::Pointer(PointerEvent {
            device_id: 0,
            action: PointerAction::Motion,
            buttons: PointerButtons::empty(),
            modifiers: Modifiers::empty(),
            x,
            y,
            hscroll: 0.0,
            vscroll: 0.0,
            relative_x: 0.0,
            relative_y: 0.0,
            timestamp_ns,
        })
    }

    /// Convenience constructor for a single-finger touch
    pub fn single_touch(action: TouchAction, x: f32, y: f32, timestamp_ns: u64) -> Self {
        InputEvent::Touch(TouchEvent {
            device_id: 0,
            modifiers: Modifiers::empty(),
            points: vec![TouchPoint {
                id: 0,
                action,
                tool: ToolType::Finger,
                x,
                y,
                touch_major: 0.0,
                touch_minor: 0.0,
                size: 0.0,
                pressure: 1.0,
            }],
            timestamp_ns,
        })
    }
}
