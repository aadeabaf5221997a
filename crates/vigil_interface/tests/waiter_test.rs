//! Tests for correlation-id waits and the mock platform.

use std::sync::Arc;
use std::time::Duration;
use vigil_interface::{
    ChatPlatform, Embed, InteractionWaiter, MockChatPlatform, NewChannel, OutgoingMessage,
};

#[tokio::test(start_paused = true)]
async fn test_wait_resolves_before_timeout() {
    let waiter: Arc<InteractionWaiter<&'static str>> = Arc::new(InteractionWaiter::new());
    let background = Arc::clone(&waiter);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        background.resolve("close-confirm:1", "yes");
    });

    let result = waiter.wait("close-confirm:1", Duration::from_secs(60)).await;
    assert_eq!(result, Some("yes"));
    assert!(!waiter.is_pending("close-confirm:1"));
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_and_late_resolution_is_ignored() {
    let waiter: InteractionWaiter<u8> = InteractionWaiter::new();
    let result = waiter.wait("upload:42", Duration::from_secs(60)).await;
    assert_eq!(result, None);
    assert!(!waiter.is_pending("upload:42"));
    assert!(!waiter.resolve("upload:42", 1));
}

#[tokio::test]
async fn test_mock_records_calls() {
    let platform = MockChatPlatform::new(99);
    let channel = NewChannel {
        name: "ticket-1".to_string(),
        parent_id: None,
        topic: Some("Ticket #1".to_string()),
        overwrites: Vec::new(),
    };
    let channel_id = platform.create_channel(5, &channel).await.expect("create");
    let message_id = platform
        .send_message(channel_id, &OutgoingMessage::embed(Embed::new("hi")))
        .await
        .expect("send");

    assert_eq!(platform.created_channels().len(), 1);
    assert_eq!(platform.messages_in(channel_id)[0].message_id, message_id);
    assert_eq!(platform.topic(channel_id).as_deref(), Some("Ticket #1"));

    platform.close_direct_messages(7);
    assert!(
        platform
            .send_direct_message(7, &OutgoingMessage::text("x"))
            .await
            .is_err()
    );
}
