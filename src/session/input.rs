//! Synthetic keyboard input and focus.

use tracing::debug;

use crate::error::Result;
use crate::protocol::{InputCommand, KeyEventType, PageCommand};

use super::Session;
use super::keyboard::Key;

// ============================================================================
// Session - Input
// ============================================================================

impl Session {
    /// Presses and releases one key.
    ///
    /// Dispatches keyDown, then char for printable keys, then keyUp. Each
    /// event is acknowledged before the next is sent.
    pub async fn press_key(&self, key: Key) -> Result<()> {
        debug!(target_id = %self.inner.target_id, key = %key.key(), "Pressing key");

        self.send_command(key_event(key, KeyEventType::KeyDown)).await?;
        if key.is_printable() {
            self.send_command(key_event(key, KeyEventType::Char)).await?;
        }
        self.send_command(key_event(key, KeyEventType::KeyUp)).await?;
        Ok(())
    }

    /// Types text one character at a time.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        for c in text.chars() {
            self.press_key(Key::from(c)).await?;
        }
        Ok(())
    }

    /// Brings the page to the front so it receives input.
    pub async fn bring_to_front(&self) -> Result<()> {
        self.send_command(PageCommand::BringToFront).await?;
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds one phase of a key press.
fn key_event(key: Key, event_type: KeyEventType) -> InputCommand {
    let modifiers = Some(key.modifiers()).filter(|&m| m != 0);

    match event_type {
        KeyEventType::Char => InputCommand::DispatchKeyEvent {
            event_type,
            key: key.key(),
            code: None,
            text: key.text(),
            windows_virtual_key_code: None,
            native_virtual_key_code: None,
            modifiers,
        },
        KeyEventType::KeyDown | KeyEventType::KeyUp => InputCommand::DispatchKeyEvent {
            event_type,
            key: key.key(),
            code: key.code(),
            text: None,
            windows_virtual_key_code: key.key_code(),
            native_virtual_key_code: key.key_code(),
            modifiers,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::session::core::tests::session_pair;
    use crate::transport::connection::tests::{RemoteEnd, next_json, push_json};

    /// Acknowledges the next request and returns its params.
    async fn ack(remote: &mut RemoteEnd) -> serde_json::Value {
        let request = next_json(remote).await;
        assert_eq!(request["method"], "Input.dispatchKeyEvent");
        push_json(remote, json!({ "id": request["id"], "result": {} })).await;
        request["params"].clone()
    }

    #[tokio::test]
    async fn test_press_printable_key_sends_three_events() {
        let (session, mut remote) = session_pair().await;

        let press = tokio::spawn({
            let session = session.clone();
            async move { session.press_key(Key::Char('t')).await }
        });

        let down = ack(&mut remote).await;
        let chr = ack(&mut remote).await;
        let up = ack(&mut remote).await;
        press.await.expect("join").expect("press");

        assert_eq!(down["type"], "keyDown");
        assert_eq!(down["code"], "KeyT");
        assert_eq!(down["windowsVirtualKeyCode"], 84);
        assert_eq!(down["nativeVirtualKeyCode"], 84);
        assert_eq!(chr["type"], "char");
        assert_eq!(chr["text"], "t");
        assert!(chr.get("code").is_none());
        assert_eq!(up["type"], "keyUp");
        assert!(up.get("text").is_none());
    }

    #[tokio::test]
    async fn test_press_control_key_skips_char() {
        let (session, mut remote) = session_pair().await;

        let press = tokio::spawn({
            let session = session.clone();
            async move { session.press_key(Key::Escape).await }
        });

        let down = ack(&mut remote).await;
        let up = ack(&mut remote).await;
        press.await.expect("join").expect("press");

        assert_eq!(down["type"], "keyDown");
        assert_eq!(down["key"], "Escape");
        assert_eq!(up["type"], "keyUp");
        assert_eq!(session.connection().pending_count(), 0);
    }

    #[test]
    fn test_shifted_key_carries_modifier() {
        let (_, params) = crate::protocol::Command::from(key_event(Key::Char('G'), KeyEventType::KeyDown))
            .into_parts()
            .expect("parts");
        assert_eq!(params["modifiers"], 8);
        assert_eq!(params["key"], "G");
    }
}
