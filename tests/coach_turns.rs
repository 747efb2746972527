use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reverie::{
    CoachTurnHandler, Goal, InMemoryJournalStore, LlmClient, LlmError, Profile, SessionEvent,
    SessionRegistry, Token, TokenStream, TurnError,
};
use tokio_stream::{Stream, StreamExt};

/// Provider double that pops one token script per streaming call and
/// records the prompts it was given. Tokens are spaced out with short
/// sleeps so overlapping turns would interleave if nothing serialized them.
#[derive(Default)]
struct QueueLlm {
    scripts: Mutex<VecDeque<Vec<Result<String, String>>>>,
    prompts: Mutex<Vec<String>>,
}

impl QueueLlm {
    fn with_scripts(scripts: Vec<Vec<Result<&str, &str>>>) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|s| {
                        s.into_iter()
                            .map(|r| r.map(str::to_string).map_err(str::to_string))
                            .collect()
                    })
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompt(&self, idx: usize) -> String {
        self.prompts.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl LlmClient for QueueLlm {
    async fn complete_text(&self, _prompt: &str) -> Result<String, LlmError> {
        Err("not a completion test".into())
    }

    async fn complete_structured(&self, _prompt: &str) -> Result<serde_json::Value, LlmError> {
        Err("not a completion test".into())
    }

    async fn stream_text(&self, prompt: &str) -> Result<TokenStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or("no script queued")?;
        Ok(Box::pin(async_stream::stream! {
            for item in script {
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield item
                    .map(|text| Token { text })
                    .map_err(LlmError::from);
            }
        }))
    }
}

fn seeded_store(owner: &str) -> Arc<InMemoryJournalStore> {
    let store = Arc::new(InMemoryJournalStore::new());
    store.insert_profile(Profile {
        owner_id: owner.into(),
        summary: "Lucid-dreaming beginner, journals nightly.".into(),
    });
    store.push_goal(
        owner,
        Goal {
            title: "Recall one dream per night".into(),
            detail: None,
        },
    );
    store
}

async fn collect_fragments(
    rx: &mut (impl Stream<Item = SessionEvent> + Unpin),
    count: usize,
) -> Vec<String> {
    let mut fragments = Vec::new();
    while fragments.len() < count {
        match rx.next().await {
            Some(SessionEvent::Fragment { text }) => fragments.push(text),
            Some(SessionEvent::Connected) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    fragments
}

#[tokio::test]
async fn turn_streams_context_grounded_reply_to_the_session() {
    let store = seeded_store("u1");
    let llm = Arc::new(QueueLlm::with_scripts(vec![vec![
        Ok("Flying "),
        Ok("often "),
        Ok("means freedom."),
    ]]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = CoachTurnHandler::new(store, llm.clone(), registry.clone());

    let mut rx = registry.open("u1");
    let outcome = handler
        .turn("u1", "What does flying mean?")
        .await
        .unwrap();
    assert_eq!(outcome.fragments_sent, 3);
    assert!(outcome.delivered);

    let fragments = collect_fragments(&mut rx, 3).await;
    assert_eq!(fragments.join(""), "Flying often means freedom.");

    let prompt = llm.prompt(0);
    assert!(prompt.contains("Lucid-dreaming beginner"));
    assert!(prompt.contains("Recall one dream per night"));
    assert!(prompt.contains("What does flying mean?"));
}

#[tokio::test]
async fn missing_profile_yields_error_event_and_no_provider_call() {
    let store = Arc::new(InMemoryJournalStore::new());
    let llm = Arc::new(QueueLlm::with_scripts(vec![vec![Ok("never sent")]]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = CoachTurnHandler::new(store, llm.clone(), registry.clone());

    let mut rx = registry.open("u1");
    let err = handler.turn("u1", "hello?").await.unwrap_err();
    assert!(matches!(err, TurnError::ProfileMissing));
    assert!(llm.prompts.lock().unwrap().is_empty());

    assert_eq!(rx.next().await, Some(SessionEvent::Connected));
    assert!(matches!(rx.next().await, Some(SessionEvent::Error { .. })));
}

#[tokio::test]
async fn mid_stream_provider_failure_keeps_partial_output() {
    let store = seeded_store("u1");
    let llm = Arc::new(QueueLlm::with_scripts(vec![vec![
        Ok("You were "),
        Ok("about to "),
        Err("connection reset"),
    ]]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = CoachTurnHandler::new(store, llm, registry.clone());

    let mut rx = registry.open("u1");
    let err = handler.turn("u1", "go on").await.unwrap_err();
    assert!(matches!(err, TurnError::ProviderFailed(_)));

    assert_eq!(rx.next().await, Some(SessionEvent::Connected));
    assert_eq!(
        rx.next().await,
        Some(SessionEvent::Fragment {
            text: "You were ".into()
        })
    );
    assert_eq!(
        rx.next().await,
        Some(SessionEvent::Fragment {
            text: "about to ".into()
        })
    );
    assert!(matches!(rx.next().await, Some(SessionEvent::Error { .. })));
}

#[tokio::test]
async fn same_owner_turns_are_serialized_not_interleaved() {
    let store = seeded_store("u1");
    let llm = Arc::new(QueueLlm::with_scripts(vec![
        vec![Ok("a1"), Ok("a2"), Ok("a3")],
        vec![Ok("b1"), Ok("b2"), Ok("b3")],
    ]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = Arc::new(CoachTurnHandler::new(store, llm, registry.clone()));

    let mut rx = registry.open("u1");
    let first = tokio::spawn({
        let handler = handler.clone();
        async move { handler.turn("u1", "first").await }
    });
    let second = tokio::spawn({
        let handler = handler.clone();
        async move { handler.turn("u1", "second").await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let fragments = collect_fragments(&mut rx, 6).await;
    // Whichever turn went first, its three fragments arrive as a block.
    let first_prefix = &fragments[0][..1];
    assert!(fragments[..3].iter().all(|f| f.starts_with(first_prefix)));
    assert!(fragments[3..].iter().all(|f| !f.starts_with(first_prefix)));
}

#[tokio::test]
async fn disconnect_mid_turn_drops_remaining_fragments_without_failing() {
    let store = seeded_store("u1");
    let llm = Arc::new(QueueLlm::with_scripts(vec![vec![
        Ok("one"),
        Ok("two"),
        Ok("three"),
    ]]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = Arc::new(CoachTurnHandler::new(store, llm, registry.clone()));

    let mut rx = registry.open("u1");
    let turn = tokio::spawn({
        let handler = handler.clone();
        async move { handler.turn("u1", "talk to me").await }
    });

    // Wait for the first fragment, then disconnect the client.
    assert_eq!(rx.next().await, Some(SessionEvent::Connected));
    assert_eq!(
        rx.next().await,
        Some(SessionEvent::Fragment { text: "one".into() })
    );
    registry.close("u1");

    let outcome = turn.await.unwrap().unwrap();
    assert!(!outcome.delivered);
    assert!(outcome.fragments_sent >= 1);
}

#[tokio::test]
async fn turns_for_different_owners_run_independently() {
    let store = Arc::new(InMemoryJournalStore::new());
    for owner in ["u1", "u2"] {
        store.insert_profile(Profile {
            owner_id: owner.into(),
            summary: "dreamer".into(),
        });
    }
    let llm = Arc::new(QueueLlm::with_scripts(vec![
        vec![Ok("for one")],
        vec![Ok("for two")],
    ]));
    let registry = Arc::new(SessionRegistry::new());
    let handler = Arc::new(CoachTurnHandler::new(store, llm, registry.clone()));

    let mut rx1 = registry.open("u1");
    let mut rx2 = registry.open("u2");

    let t1 = tokio::spawn({
        let handler = handler.clone();
        async move { handler.turn("u1", "hi").await }
    });
    let t2 = tokio::spawn({
        let handler = handler.clone();
        async move { handler.turn("u2", "hi").await }
    });
    t1.await.unwrap().unwrap();
    t2.await.unwrap().unwrap();

    let one = collect_fragments(&mut rx1, 1).await;
    let two = collect_fragments(&mut rx2, 1).await;
    // Scripts are popped in call order, so either owner may get either
    // reply; each session must still see exactly one fragment.
    assert_eq!(one.len(), 1);
    assert_eq!(two.len(), 1);
}
