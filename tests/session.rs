//! End-to-end tests of the session actor against a scripted channel.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use castellan::{
    channel::{ChannelEvent, ReceiverChannel},
    config::SessionConfig,
    error::{Error, Result},
    progress::ProgressReport,
    protocol::{
        media::{ItemMetadata, MediaInformation, MediaStatus, PlayerState, RepeatMode},
        queue::{QueueItem, QueueUpdate},
    },
    session::DeviceSession,
    sink::{NotificationSink, ProgressSink},
    state::Session,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load,
    QueueLoad(usize),
    QueueInsert(usize, Option<usize>),
    QueueRemove(Vec<u64>),
    QueueReorder(Vec<u64>),
    QueueUpdate(Option<usize>),
    QueueItemIds,
    QueueItems(usize),
    Play,
    Pause,
    Stop,
    Seek(u64),
    Next,
    Previous,
    SetRate,
    Launch(String),
    SetVolume,
    SetMuted(bool),
    RefreshStatus,
}

struct MockChannel {
    calls: Mutex<Vec<Call>>,
    events: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    item_ids: Mutex<Vec<u64>>,
    items: Mutex<HashMap<u64, QueueItem>>,
    fail_play: Mutex<Option<Error>>,
}

impl MockChannel {
    fn new() -> (Arc<Self>, mpsc::Sender<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(32);
        let channel = Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Some(events_rx)),
            item_ids: Mutex::new(Vec::new()),
            items: Mutex::new(HashMap::new()),
            fail_play: Mutex::new(None),
        });
        (channel, events_tx)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn set_queue(&self, items: Vec<QueueItem>) {
        let mut ids = self.item_ids.lock().unwrap();
        let mut map = self.items.lock().unwrap();
        ids.clear();
        map.clear();
        for item in items {
            ids.push(item.item_id);
            map.insert(item.item_id, item);
        }
    }

    fn fail_next_play(&self, e: Error) {
        *self.fail_play.lock().unwrap() = Some(e);
    }
}

#[async_trait]
impl ReceiverChannel for MockChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<ChannelEvent>> {
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Channel("already connected".to_owned()))
    }

    async fn load(&self, _media: &MediaInformation) -> Result<()> {
        self.record(Call::Load);
        Ok(())
    }

    async fn queue_load(&self, _repeat_mode: RepeatMode, items: &[MediaInformation]) -> Result<()> {
        assert!(items.len() <= 20);
        self.record(Call::QueueLoad(items.len()));
        Ok(())
    }

    async fn queue_insert(
        &self,
        items: &[MediaInformation],
        before_index: Option<usize>,
    ) -> Result<()> {
        assert!(items.len() <= 20);
        self.record(Call::QueueInsert(items.len(), before_index));
        Ok(())
    }

    async fn queue_remove(&self, item_ids: &[u64]) -> Result<()> {
        self.record(Call::QueueRemove(item_ids.to_vec()));
        Ok(())
    }

    async fn queue_reorder(&self, item_ids: &[u64]) -> Result<()> {
        self.record(Call::QueueReorder(item_ids.to_vec()));
        Ok(())
    }

    async fn queue_update(&self, update: &QueueUpdate) -> Result<()> {
        let items = update.items.as_ref().map(Vec::len);
        assert!(items.unwrap_or(0) <= 20);
        self.record(Call::QueueUpdate(items));
        Ok(())
    }

    async fn queue_item_ids(&self) -> Result<Vec<u64>> {
        self.record(Call::QueueItemIds);
        Ok(self.item_ids.lock().unwrap().clone())
    }

    async fn queue_items(&self, item_ids: &[u64]) -> Result<Vec<QueueItem>> {
        assert!(item_ids.len() <= 20);
        self.record(Call::QueueItems(item_ids.len()));
        let map = self.items.lock().unwrap();
        Ok(item_ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn play(&self) -> Result<()> {
        if let Some(e) = self.fail_play.lock().unwrap().take() {
            return Err(e);
        }
        self.record(Call::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn seek(&self, position: u64) -> Result<()> {
        self.record(Call::Seek(position));
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        self.record(Call::Next);
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        self.record(Call::Previous);
        Ok(())
    }

    async fn set_rate(&self, _rate: f64) -> Result<()> {
        self.record(Call::SetRate);
        Ok(())
    }

    async fn launch(&self, app_id: &str) -> Result<()> {
        self.record(Call::Launch(app_id.to_owned()));
        Ok(())
    }

    async fn set_volume(&self, _level: f32) -> Result<()> {
        self.record(Call::SetVolume);
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.record(Call::SetMuted(muted));
        Ok(())
    }

    async fn refresh_status(&self) -> Result<()> {
        self.record(Call::RefreshStatus);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifications {
    statuses: Mutex<Vec<Session>>,
    errors: Mutex<Vec<String>>,
}

impl NotificationSink for RecordingNotifications {
    fn push_status(&self, _receiver_name: &str, session: &Session) {
        self.statuses.lock().unwrap().push(session.clone());
    }

    fn push_error(&self, _receiver_name: &str, message: &str) {
        self.errors.lock().unwrap().push(message.to_owned());
    }
}

#[derive(Default)]
struct RecordingProgress {
    reports: Mutex<Vec<(ProgressReport, bool)>>,
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn report(
        &self,
        report: &ProgressReport,
        _user_id: Uuid,
        _receiver_name: &str,
        _receiver_id: Uuid,
        stopped: bool,
    ) -> Result<()> {
        self.reports.lock().unwrap().push((report.clone(), stopped));
        Ok(())
    }
}

struct Fixture {
    channel: Arc<MockChannel>,
    events: mpsc::Sender<ChannelEvent>,
    notifications: Arc<RecordingNotifications>,
    progress: Arc<RecordingProgress>,
    session: DeviceSession,
}

fn fixture() -> Fixture {
    init();
    let (channel, events) = MockChannel::new();
    let notifications = Arc::new(RecordingNotifications::default());
    let progress = Arc::new(RecordingProgress::default());
    let config = SessionConfig::new(
        Uuid::new_v4(),
        "Living Room",
        "192.168.1.20:8009".parse().unwrap(),
        "APP1234",
    );
    let session = DeviceSession::spawn(
        channel.clone(),
        config,
        notifications.clone(),
        progress.clone(),
    );
    Fixture {
        channel,
        events,
        notifications,
        progress,
        session,
    }
}

fn media(content: &str) -> MediaInformation {
    MediaInformation {
        content_id: content.to_owned(),
        duration: None,
        metadata: ItemMetadata::default(),
    }
}

fn playing(media_id: Uuid, user_id: Uuid, state: PlayerState) -> MediaStatus {
    MediaStatus {
        state,
        position: Some(10),
        rate: 1.0,
        current_item_id: None,
        media: Some(MediaInformation {
            content_id: "content".to_owned(),
            duration: Some(600),
            metadata: ItemMetadata {
                title: Some("Something".to_owned()),
                media_id: Some(media_id),
                user_id: Some(user_id),
            },
        }),
    }
}

fn receiver_item(item_id: u64, order: usize) -> QueueItem {
    QueueItem {
        item_id,
        order,
        media: media(&format!("content-{item_id}")),
    }
}

/// Waits until the session reports media as initialized.
async fn wait_initialized(session: &DeviceSession) {
    for _ in 0..100 {
        if session.status().await.unwrap().initialized {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("session never initialized");
}

#[tokio::test]
async fn gated_commands_are_noops_while_stopped() {
    let f = fixture();

    f.session.pause().await.unwrap();
    f.session.play().await.unwrap();
    f.session.seek(30).await.unwrap();
    f.session.next().await.unwrap();
    assert!(f.channel.calls().is_empty());

    // Stop is ungated and goes through even with no media.
    f.session.stop().await.unwrap();
    assert_eq!(f.channel.calls(), vec![Call::Stop]);
}

#[tokio::test]
async fn gated_commands_pass_once_media_is_active() {
    let f = fixture();
    let media_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    f.events
        .send(ChannelEvent::Media(Some(playing(
            media_id,
            user_id,
            PlayerState::Paused,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;

    f.session.pause().await.unwrap();
    assert_eq!(f.channel.calls(), vec![Call::Pause]);
}

#[tokio::test]
async fn seek_clamps_to_duration() {
    let f = fixture();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;

    f.session.seek(9999).await.unwrap();
    assert_eq!(f.channel.calls(), vec![Call::Seek(600)]);
}

#[tokio::test]
async fn initialize_queue_chunks_at_twenty() {
    let f = fixture();

    // 45 scripted receiver-side items so the post-load refetch succeeds.
    f.channel.set_queue(
        (0..45)
            .map(|n: u64| receiver_item(n + 100, n as usize))
            .collect(),
    );

    let items: Vec<_> = (0..45).map(|n| media(&format!("track-{n}"))).collect();
    f.session.initialize_queue(items).await.unwrap();

    let calls = f.channel.calls();
    assert_eq!(
        calls[..4],
        [
            Call::Launch("APP1234".to_owned()),
            Call::QueueLoad(20),
            Call::QueueInsert(20, None),
            Call::QueueInsert(5, None),
        ]
    );
    // Refetch: id list, then ceil(45 / 20) payload chunks.
    assert_eq!(calls[4], Call::QueueItemIds);
    assert_eq!(
        calls[5..],
        [Call::QueueItems(20), Call::QueueItems(20), Call::QueueItems(5)]
    );

    // Local projection matches the receiver order, densely numbered.
    let snapshot = f.session.status().await.unwrap();
    assert_eq!(snapshot.queue.len(), 45);
    for (index, entry) in snapshot.queue.iter().enumerate() {
        assert_eq!(entry.order, index);
        assert_eq!(entry.item_id, index as u64 + 100);
    }
}

#[tokio::test]
async fn empty_chunk_fetch_drops_the_whole_projection() {
    let f = fixture();

    // Ids known, payloads missing: the projection must come back empty,
    // not partially populated.
    {
        let mut ids = f.channel.item_ids.lock().unwrap();
        ids.extend(0..30u64);
    }
    let items = castellan::queue::fetch(f.channel.as_ref()).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn launch_is_skipped_when_another_app_is_foregrounded() {
    let f = fixture();

    f.events
        .send(ChannelEvent::Receiver(
            castellan::protocol::receiver::ReceiverStatus {
                application: Some(castellan::protocol::receiver::ApplicationInfo {
                    app_id: "OTHERAPP".to_owned(),
                    display_name: "Someone else".to_owned(),
                }),
                volume: None,
                muted: None,
            },
        ))
        .await
        .unwrap();
    // Wait for the receiver status to land.
    for _ in 0..100 {
        if f.session.status().await.unwrap().application.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }

    f.session.initialize_item(media("track")).await.unwrap();

    let calls = f.channel.calls();
    assert!(!calls.iter().any(|call| matches!(call, Call::Launch(_))));
    assert_eq!(calls[0], Call::Load);
}

#[tokio::test]
async fn queue_edits_are_skipped_on_an_empty_queue() {
    let f = fixture();

    f.session.queue_remove(vec![1, 2]).await.unwrap();
    f.session.move_up(vec![1]).await.unwrap();
    f.session.set_shuffle(true).await.unwrap();
    f.session.set_repeat_mode(RepeatMode::All).await.unwrap();

    assert!(f.channel.calls().is_empty());
}

#[tokio::test]
async fn move_up_resubmits_the_complete_order() {
    let f = fixture();
    f.channel.set_queue(vec![
        receiver_item(5, 0),
        receiver_item(2, 1),
        receiver_item(9, 2),
    ]);
    f.session.initialize_queue(vec![media("a")]).await.unwrap();

    f.session.move_up(vec![9]).await.unwrap();

    assert_eq!(
        f.channel.calls().last(),
        Some(&Call::QueueReorder(vec![5, 9, 2]))
    );
}

#[tokio::test]
async fn toggle_mute_inverts_and_defaults_to_muting() {
    let f = fixture();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;

    // Mute state unknown: toggling must err on the side of muting.
    f.session.toggle_mute().await.unwrap();
    assert_eq!(f.channel.calls().last(), Some(&Call::SetMuted(true)));

    f.events
        .send(ChannelEvent::Receiver(
            castellan::protocol::receiver::ReceiverStatus {
                application: None,
                volume: None,
                muted: Some(true),
            },
        ))
        .await
        .unwrap();
    for _ in 0..100 {
        if f.session.status().await.unwrap().muted == Some(true) {
            break;
        }
        tokio::task::yield_now().await;
    }

    f.session.toggle_mute().await.unwrap();
    assert_eq!(f.channel.calls().last(), Some(&Call::SetMuted(false)));
}

#[tokio::test]
async fn queue_insert_advances_the_insertion_point_across_chunks() {
    let f = fixture();
    f.channel.set_queue(vec![
        receiver_item(1, 0),
        receiver_item(2, 1),
        receiver_item(3, 2),
    ]);
    f.session.initialize_queue(vec![media("a")]).await.unwrap();
    let prior = f.channel.calls().len();

    let items: Vec<_> = (0..25).map(|n| media(&format!("insert-{n}"))).collect();
    f.session.queue_insert(items, Some(3)).await.unwrap();

    assert_eq!(
        f.channel.calls()[prior..],
        [
            Call::QueueInsert(20, Some(3)),
            Call::QueueInsert(5, Some(23)),
        ]
    );
}

#[tokio::test]
async fn queue_settings_reach_a_live_queue() {
    let f = fixture();
    f.channel
        .set_queue(vec![receiver_item(1, 0), receiver_item(2, 1)]);
    f.session.initialize_queue(vec![media("a")]).await.unwrap();
    let prior = f.channel.calls().len();

    f.session.set_shuffle(true).await.unwrap();
    f.session.set_repeat_mode(RepeatMode::Single).await.unwrap();
    f.session.set_current_item(2).await.unwrap();

    assert_eq!(
        f.channel.calls()[prior..],
        [
            Call::QueueUpdate(None),
            Call::QueueUpdate(None),
            Call::QueueUpdate(None),
        ]
    );
}

#[tokio::test]
async fn update_items_chunks_at_twenty() {
    let f = fixture();
    f.channel.set_queue(vec![receiver_item(1, 0)]);
    f.session.initialize_queue(vec![media("a")]).await.unwrap();
    let prior = f.channel.calls().len();

    let items: Vec<_> = (0..45).map(|n: u64| receiver_item(n, n as usize)).collect();
    f.session.update_items(items).await.unwrap();

    assert_eq!(
        f.channel.calls()[prior..],
        [
            Call::QueueUpdate(Some(20)),
            Call::QueueUpdate(Some(20)),
            Call::QueueUpdate(Some(5)),
        ]
    );
}

#[tokio::test]
async fn finish_then_new_media_reports_exactly_one_stop() {
    let f = fixture();
    let user_id = Uuid::new_v4();
    let old_media = Uuid::new_v4();
    let new_media = Uuid::new_v4();

    f.events
        .send(ChannelEvent::Media(Some(playing(
            old_media,
            user_id,
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            old_media,
            user_id,
            PlayerState::Finished,
        ))))
        .await
        .unwrap();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            new_media,
            user_id,
            PlayerState::Playing,
        ))))
        .await
        .unwrap();

    // Wait for the last report to arrive.
    for _ in 0..200 {
        if f.progress.reports.lock().unwrap().len() >= 3 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let reports = f.progress.reports.lock().unwrap();
    assert_eq!(reports.len(), 3);
    assert!(!reports[0].1);
    assert_eq!(reports[0].0.media_id, old_media);
    assert!(reports[1].1, "finish must use stop semantics");
    assert_eq!(reports[1].0.media_id, old_media);
    assert!(!reports[2].1);
    assert_eq!(reports[2].0.media_id, new_media);
}

#[tokio::test]
async fn null_media_clears_everything_idempotently() {
    let f = fixture();
    f.channel
        .set_queue(vec![receiver_item(1, 0), receiver_item(2, 1)]);
    f.session.initialize_queue(vec![media("a")]).await.unwrap();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;

    for _ in 0..2 {
        f.events.send(ChannelEvent::Media(None)).await.unwrap();
        loop {
            let snapshot = f.session.status().await.unwrap();
            if !snapshot.initialized {
                assert!(snapshot.media_status.is_none());
                assert!(snapshot.position.is_none());
                assert!(snapshot.queue.is_empty());
                break;
            }
            tokio::task::yield_now().await;
        }
    }
}

#[tokio::test]
async fn failed_command_reports_and_tears_down() {
    let f = fixture();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;

    f.channel
        .fail_next_play(Error::Channel("connection reset".to_owned()));
    let result = f.session.play().await;
    assert!(matches!(result, Err(Error::Channel(_))));

    // The failure boundary pushed an error and self-terminated.
    assert_eq!(f.notifications.errors.lock().unwrap().len(), 1);
    assert!(matches!(f.session.status().await, Err(Error::Disposed)));

    // A stop report was flushed for the active progress session.
    let reports = f.progress.reports.lock().unwrap();
    assert!(reports.last().unwrap().1);
}

#[tokio::test]
async fn dispose_is_idempotent() {
    let f = fixture();
    f.session.dispose().await;
    f.session.dispose().await;

    // One final status push, no errors, and commands now fail cleanly.
    assert_eq!(f.notifications.statuses.lock().unwrap().len(), 1);
    assert!(f.notifications.errors.lock().unwrap().is_empty());
    assert!(matches!(f.session.status().await, Err(Error::Disposed)));
    assert!(matches!(f.session.play().await, Err(Error::Disposed)));
}

#[tokio::test(start_paused = true)]
async fn tick_advances_position_and_forces_a_poll() {
    let f = fixture();
    f.events
        .send(ChannelEvent::Media(Some(playing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerState::Playing,
        ))))
        .await
        .unwrap();
    wait_initialized(&f.session).await;
    let start = f.session.status().await.unwrap().position.unwrap();

    // Drive fifteen one-second ticks through the actor.
    for _ in 0..15 {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    // Position clocked forward locally, and the 10th tick forced a full
    // status poll plus the one-time queue poll.
    let calls = f.channel.calls();
    assert!(calls.contains(&Call::RefreshStatus));
    assert!(calls.contains(&Call::QueueItemIds));

    let position = f.session.status().await.unwrap().position.unwrap();
    assert!(position >= start + 10, "position {position} never advanced");
}
