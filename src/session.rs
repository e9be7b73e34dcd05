//! The per-receiver session actor and its public command surface.
//!
//! One [`DeviceSession`] exists per physical receiver. Internally a single
//! actor task owns all mutable state; commands, push events and the
//! one-second position tick are serialized through its `select!` loop, so
//! no two mutating sections ever run concurrently. Handles are cheap
//! clones of the command sender.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    channel::{ChannelEvent, ReceiverChannel},
    config::SessionConfig,
    error::{Error, Result},
    progress::{self, Mirrored},
    protocol::{
        media::{MediaInformation, RepeatMode},
        queue::{QueueItem, QueueUpdate, MAX_BATCH},
    },
    queue::{self, Shift},
    router::{self, Effect},
    sink::{NotificationSink, ProgressSink},
    state::Session,
};

/// Mailbox depth for the command surface. Commands are fire-and-await, so
/// the buffer only smooths momentary bursts.
const COMMAND_BUFFER: usize = 16;

enum Command {
    Status(oneshot::Sender<Session>),
    InitializeItem(MediaInformation, oneshot::Sender<Result<()>>),
    InitializeQueue(Vec<MediaInformation>, oneshot::Sender<Result<()>>),
    Play(oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<()>>),
    Seek(u64, oneshot::Sender<Result<()>>),
    SetRate(f64, oneshot::Sender<Result<()>>),
    Next(oneshot::Sender<Result<()>>),
    Previous(oneshot::Sender<Result<()>>),
    SetVolume(f32, oneshot::Sender<Result<()>>),
    ToggleMute(oneshot::Sender<Result<()>>),
    QueueInsert {
        items: Vec<MediaInformation>,
        before_index: Option<usize>,
        reply: oneshot::Sender<Result<()>>,
    },
    QueueRemove(Vec<u64>, oneshot::Sender<Result<()>>),
    Move(Shift, Vec<u64>, oneshot::Sender<Result<()>>),
    SetShuffle(bool, oneshot::Sender<Result<()>>),
    SetRepeatMode(RepeatMode, oneshot::Sender<Result<()>>),
    SetCurrentItem(u64, oneshot::Sender<Result<()>>),
    UpdateItems(Vec<QueueItem>, oneshot::Sender<Result<()>>),
    Dispose(oneshot::Sender<()>),
}

/// Handle to one receiver's session actor.
///
/// Construction spawns the actor and begins connecting asynchronously;
/// the caller is never blocked on the connection. Every command suspends
/// until the receiver acknowledges or the failure boundary reports an
/// error. After disposal all commands return [`Error::Disposed`].
#[derive(Clone)]
pub struct DeviceSession {
    commands: mpsc::Sender<Command>,
}

impl DeviceSession {
    /// Spawns the session actor for one receiver.
    #[must_use]
    pub fn spawn(
        channel: Arc<dyn ReceiverChannel>,
        config: SessionConfig,
        notifications: Arc<dyn NotificationSink>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let task = SessionTask {
            session: Session::new(&config),
            channel,
            config,
            notifications,
            progress,
            ticks: 0,
            queue_polled: false,
        };
        tokio::spawn(task.run(commands_rx));

        Self {
            commands: commands_tx,
        }
    }

    async fn send<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::Disposed)?;
        reply_rx.await.map_err(|_| Error::Disposed)
    }

    /// Current session snapshot. Pure read, no receiver round-trip.
    pub async fn status(&self) -> Result<Session> {
        self.send(Command::Status).await
    }

    /// Launches the target application if nothing incompatible is
    /// foregrounded, replaces the queue with this single item and loads
    /// it, then refreshes the queue projection.
    pub async fn initialize_item(&self, media: MediaInformation) -> Result<()> {
        self.send(|reply| Command::InitializeItem(media, reply))
            .await?
    }

    /// Same launch policy as [`initialize_item`](Self::initialize_item),
    /// then bulk-loads the queue in chunks of 20 and refreshes the
    /// projection.
    pub async fn initialize_queue(&self, items: Vec<MediaInformation>) -> Result<()> {
        self.send(|reply| Command::InitializeQueue(items, reply))
            .await?
    }

    /// No-op unless media is playing or paused.
    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await?
    }

    /// No-op unless media is playing or paused.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await?
    }

    /// Always reaches the receiver-level channel, even with no media
    /// loaded.
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await?
    }

    /// Seeks to `position` seconds, clamped to the known duration. No-op
    /// unless media is playing or paused.
    pub async fn seek(&self, position: u64) -> Result<()> {
        self.send(|reply| Command::Seek(position, reply)).await?
    }

    /// No-op unless media is playing or paused.
    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        self.send(|reply| Command::SetRate(rate, reply)).await?
    }

    /// No-op unless media is playing or paused.
    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await?
    }

    /// No-op unless media is playing or paused.
    pub async fn previous(&self) -> Result<()> {
        self.send(Command::Previous).await?
    }

    /// No-op unless media is playing or paused.
    pub async fn set_volume(&self, level: f32) -> Result<()> {
        self.send(|reply| Command::SetVolume(level, reply)).await?
    }

    /// Inverts the last known mute flag; mutes when unknown. No-op unless
    /// media is playing or paused.
    pub async fn toggle_mute(&self) -> Result<()> {
        self.send(Command::ToggleMute).await?
    }

    /// Inserts items before the given 0-based position, or at the end.
    /// Silently skipped while the local queue is empty.
    pub async fn queue_insert(
        &self,
        items: Vec<MediaInformation>,
        before_index: Option<usize>,
    ) -> Result<()> {
        self.send(|reply| Command::QueueInsert {
            items,
            before_index,
            reply,
        })
        .await?
    }

    /// Silently skipped while the local queue is empty.
    pub async fn queue_remove(&self, item_ids: Vec<u64>) -> Result<()> {
        self.send(|reply| Command::QueueRemove(item_ids, reply))
            .await?
    }

    /// Moves the given items one position up, resubmitting the complete
    /// order. Silently skipped while the local queue is empty.
    pub async fn move_up(&self, item_ids: Vec<u64>) -> Result<()> {
        self.send(|reply| Command::Move(Shift::Up, item_ids, reply))
            .await?
    }

    /// Moves the given items one position down, resubmitting the complete
    /// order. Silently skipped while the local queue is empty.
    pub async fn move_down(&self, item_ids: Vec<u64>) -> Result<()> {
        self.send(|reply| Command::Move(Shift::Down, item_ids, reply))
            .await?
    }

    /// Silently skipped while the local queue is empty.
    pub async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.send(|reply| Command::SetShuffle(shuffle, reply)).await?
    }

    /// Silently skipped while the local queue is empty.
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.send(|reply| Command::SetRepeatMode(mode, reply))
            .await?
    }

    /// Jumps playback to the given queue item. Silently skipped while the
    /// local queue is empty.
    pub async fn set_current_item(&self, item_id: u64) -> Result<()> {
        self.send(|reply| Command::SetCurrentItem(item_id, reply))
            .await?
    }

    /// Bulk item metadata update, chunked at the receiver's per-call
    /// ceiling. Silently skipped while the local queue is empty.
    pub async fn update_items(&self, items: Vec<QueueItem>) -> Result<()> {
        self.send(|reply| Command::UpdateItems(items, reply)).await?
    }

    /// Tears the session down. Idempotent; completes once teardown has
    /// run (or immediately when the actor is already gone).
    pub async fn dispose(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Dispose(reply_tx))
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

struct SessionTask {
    channel: Arc<dyn ReceiverChannel>,
    config: SessionConfig,
    notifications: Arc<dyn NotificationSink>,
    progress: Arc<dyn ProgressSink>,
    session: Session,
    ticks: u32,
    queue_polled: bool,
}

impl SessionTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut events = match self.channel.connect().await {
            Ok(events) => events,
            Err(e) => {
                error!("connecting to {} failed: {e}", self.session.receiver_name);
                self.notifications
                    .push_error(&self.session.receiver_name, &e.to_string());
                self.teardown().await;
                return;
            }
        };
        self.session.connected = true;
        debug!(
            "connected to {} at {}",
            self.session.receiver_name, self.session.endpoint
        );

        let period = Duration::from_secs(1);
        let mut clock = interval_at(Instant::now() + period, period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.session.disposed {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // Every handle dropped; nobody can command this
                    // session anymore.
                    None => self.teardown().await,
                },
                event = events.recv() => match event {
                    Some(ChannelEvent::Disconnected) | None => {
                        warn!("{} disconnected", self.session.receiver_name);
                        self.teardown().await;
                    }
                    Some(event) => self.handle_event(event).await,
                },
                _ = clock.tick() => self.handle_tick().await,
            }
        }
        // Dropping `events` and `clock` here releases the subscription
        // and the timer.
    }

    fn media_active(&self) -> bool {
        self.session
            .media_status
            .as_ref()
            .is_some_and(|status| status.state.is_active())
    }

    fn queue_empty(&self) -> bool {
        self.session.queue.is_empty()
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Status(reply) => {
                let _ = reply.send(self.session.clone());
            }
            Command::Dispose(reply) => {
                self.teardown().await;
                let _ = reply.send(());
            }
            Command::InitializeItem(media, reply) => {
                let result = self.initialize_item(media).await;
                self.finish(reply, result).await;
            }
            Command::InitializeQueue(items, reply) => {
                let result = self.initialize_queue(items).await;
                self.finish(reply, result).await;
            }
            Command::Play(reply) => {
                let result = if self.media_active() {
                    self.channel.play().await
                } else {
                    trace!("ignoring play: no active media");
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::Pause(reply) => {
                let result = if self.media_active() {
                    self.channel.pause().await
                } else {
                    trace!("ignoring pause: no active media");
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::Stop(reply) => {
                // Deliberately ungated: stop goes to the receiver level
                // and must work with no media loaded.
                let result = self.channel.stop().await;
                self.finish(reply, result).await;
            }
            Command::Seek(position, reply) => {
                let result = if self.media_active() {
                    let duration = self
                        .session
                        .media_status
                        .as_ref()
                        .and_then(|status| status.media.as_ref())
                        .and_then(|media| media.duration);
                    let target = duration.map_or(position, |duration| position.min(duration));
                    self.channel.seek(target).await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::SetRate(rate, reply) => {
                let result = if self.media_active() {
                    self.channel.set_rate(rate).await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::Next(reply) => {
                let result = if self.media_active() {
                    self.channel.next().await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::Previous(reply) => {
                let result = if self.media_active() {
                    self.channel.previous().await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::SetVolume(level, reply) => {
                let result = if self.media_active() {
                    self.channel.set_volume(level.clamp(0.0, 1.0)).await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::ToggleMute(reply) => {
                let result = if self.media_active() {
                    let muted = !self.session.muted.unwrap_or(false);
                    self.channel.set_muted(muted).await
                } else {
                    Ok(())
                };
                self.finish(reply, result).await;
            }
            Command::QueueInsert {
                items,
                before_index,
                reply,
            } => {
                let result = if self.queue_empty() {
                    Ok(())
                } else {
                    queue::insert(self.channel.as_ref(), &items, before_index).await
                };
                self.finish(reply, result).await;
            }
            Command::QueueRemove(item_ids, reply) => {
                let result = if self.queue_empty() {
                    Ok(())
                } else {
                    self.channel.queue_remove(&item_ids).await
                };
                self.finish(reply, result).await;
            }
            Command::Move(shift, item_ids, reply) => {
                let result = if self.queue_empty() {
                    Ok(())
                } else {
                    let order = queue::shifted_order(&self.session.queue, &item_ids, shift);
                    self.channel.queue_reorder(&order).await
                };
                self.finish(reply, result).await;
            }
            Command::SetShuffle(shuffle, reply) => {
                let update = QueueUpdate {
                    shuffle: Some(shuffle),
                    ..QueueUpdate::default()
                };
                let result = self.queue_update(update).await;
                self.finish(reply, result).await;
            }
            Command::SetRepeatMode(mode, reply) => {
                let update = QueueUpdate {
                    repeat_mode: Some(mode),
                    ..QueueUpdate::default()
                };
                let result = self.queue_update(update).await;
                self.finish(reply, result).await;
            }
            Command::SetCurrentItem(item_id, reply) => {
                let update = QueueUpdate {
                    current_item_id: Some(item_id),
                    ..QueueUpdate::default()
                };
                let result = self.queue_update(update).await;
                self.finish(reply, result).await;
            }
            Command::UpdateItems(items, reply) => {
                let result = if self.queue_empty() {
                    Ok(())
                } else {
                    self.update_items(items).await
                };
                self.finish(reply, result).await;
            }
        }
    }

    async fn queue_update(&mut self, update: QueueUpdate) -> Result<()> {
        if self.queue_empty() {
            return Ok(());
        }
        self.channel.queue_update(&update).await
    }

    async fn update_items(&mut self, items: Vec<QueueItem>) -> Result<()> {
        for chunk in items.chunks(MAX_BATCH) {
            let update = QueueUpdate {
                items: Some(chunk.to_vec()),
                ..QueueUpdate::default()
            };
            self.channel.queue_update(&update).await?;
        }
        Ok(())
    }

    async fn initialize_item(&mut self, media: MediaInformation) -> Result<()> {
        self.launch_if_idle().await?;
        self.channel.load(&media).await?;
        self.refresh_queue().await
    }

    async fn initialize_queue(&mut self, items: Vec<MediaInformation>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.launch_if_idle().await?;
        queue::load(self.channel.as_ref(), &items).await?;
        self.refresh_queue().await
    }

    /// Launches the target application unless some other application is
    /// foregrounded. The idle/backdrop application does not count as "in
    /// control"; anything else does and the session defers to it.
    async fn launch_if_idle(&mut self) -> Result<()> {
        match &self.session.application {
            Some(app) if app.app_id != self.config.idle_app_id => {
                debug!("not launching, {} is foregrounded", app.app_id);
                Ok(())
            }
            _ => self.channel.launch(&self.config.app_id).await,
        }
    }

    /// Refetches the queue projection. The receiver may legitimately
    /// reject a queue query when no media is loaded; that rejection is
    /// benign and leaves the session alive.
    async fn refresh_queue(&mut self) -> Result<()> {
        match queue::fetch(self.channel.as_ref()).await {
            Ok(items) => {
                self.session.queue = items;
                Ok(())
            }
            Err(Error::InvalidState(reason)) => {
                debug!("queue refresh rejected: {reason}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_event(&mut self, event: ChannelEvent) {
        for effect in router::route(&mut self.session, event) {
            match effect {
                Effect::Report(mirrored) => self.dispatch_report(mirrored).await,
                Effect::PushStatus => self.push_status(),
                Effect::ResyncQueue => {
                    if let Err(e) = self.refresh_queue().await {
                        self.fail(e).await;
                        return;
                    }
                }
            }
        }
    }

    /// One tick of the local position clock. Every `refresh_ticks` ticks
    /// a full status poll is forced as a backstop against missed push
    /// notifications; the first poll after connect also syncs the queue.
    async fn handle_tick(&mut self) {
        if self.session.clock_running {
            if let Some(position) = self.session.position.as_mut() {
                *position += 1;
            }
        }

        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % self.config.refresh_ticks.max(1) != 0 {
            return;
        }

        if let Err(e) = self.channel.refresh_status().await {
            self.fail(e).await;
            return;
        }
        if !self.queue_polled {
            self.queue_polled = true;
            if let Err(e) = self.refresh_queue().await {
                self.fail(e).await;
            }
        }
    }

    /// Uniform failure boundary: replies to the caller and, on error,
    /// escalates through [`fail`](Self::fail).
    async fn finish(&mut self, reply: oneshot::Sender<Result<()>>, result: Result<()>) {
        if let Err(ref e) = result {
            self.fail(e.clone()).await;
        }
        let _ = reply.send(result);
    }

    /// A failed command is evidence the connection is no longer
    /// trustworthy: report and self-terminate rather than attempt partial
    /// recovery. Reconnecting is the registry's job.
    async fn fail(&mut self, e: Error) {
        error!("command failed on {}: {e}", self.session.receiver_name);
        self.notifications
            .push_error(&self.session.receiver_name, &e.to_string());
        self.teardown().await;
    }

    /// Idempotent teardown: flushes a stop report for any active progress
    /// session, clears all state, pushes a final snapshot and marks the
    /// session disposed. Safe to call from any handler, including from
    /// within the failure boundary.
    async fn teardown(&mut self) {
        if self.session.disposed {
            return;
        }
        self.session.disposed = true;

        if let Some(mirrored) = progress::stop(&self.session) {
            self.session.reported = mirrored.active;
            self.dispatch_report(mirrored).await;
        }

        self.session.teardown();
        self.push_status();
        debug!("session for {} torn down", self.session.receiver_name);
    }

    async fn dispatch_report(&self, mirrored: Mirrored) {
        if let Err(e) = self
            .progress
            .report(
                &mirrored.report,
                mirrored.user_id,
                &self.session.receiver_name,
                self.session.receiver_id,
                mirrored.stopped,
            )
            .await
        {
            // The progress service failing must not take the session
            // down with it.
            warn!("progress report failed: {e}");
        }
    }

    fn push_status(&self) {
        self.notifications
            .push_status(&self.session.receiver_name, &self.session);
    }
}
