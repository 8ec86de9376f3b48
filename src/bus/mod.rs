//! The inter-process message bus: a bounded, topic-subscribed ring
//! buffer living in shared memory, protected by a single system-wide
//! named mutex so independently forked processes can publish and consume
//! [`Message`]s without sharing address space.
//!
//! **Matching ignores `receiver`.** A message is delivered to the first
//! subscriber that polls and whose subscription `msg_type` matches,
//! regardless of the header's `receiver` field. It is then removed from
//! the queue — there is no broadcast, and a second subscriber for the
//! same type never sees a message the first one already took. This is a
//! deliberate simplification inherited from the original and is relied
//! on elsewhere: do not "fix" it.
//!
//! **Compaction drops skipped messages.** `read_message` scans forward
//! from `read_idx` for the first type match; once found, everything
//! between the old `read_idx` and the match — including messages that
//! matched nobody — is dropped in the same compaction step. This is
//! unusual and preserved deliberately.

mod mutex;
mod shm;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::common::ComponentId;
use crate::error::{Result, SimError};
use crate::messages::{Message, MessageType};

use mutex::NamedMutex;
use shm::ShmSegment;

/// Ring buffer capacity.
pub const MAX_BUS_MESSAGES: usize = 100;
/// Global subscription table capacity.
pub const MAX_SUBSCRIBERS: usize = 10;
/// Messages older than this are pruned once the queue crosses half full.
pub const MESSAGE_TIMEOUT_S: u64 = 5;

/// Name of the shared memory object and named mutex the production
/// binary uses. Deterministic and fixed so every forked child can
/// rediscover it without being told explicitly.
pub const DEFAULT_BUS_NAME: &str = "/airplane_sim_bus";

#[derive(Clone, Copy)]
struct Subscription {
  subscriber: ComponentId,
  msg_type: MessageType,
  active: bool,
}

impl Subscription {
  const EMPTY: Subscription = Subscription {
    subscriber: ComponentId::FlightController,
    msg_type: MessageType::PositionUpdate,
    active: false,
  };
}

struct Queue {
  messages: [Message; MAX_BUS_MESSAGES],
  timestamps: [u64; MAX_BUS_MESSAGES],
  read_idx: usize,
  write_idx: usize,
  count: usize,
}

impl Queue {
  fn new() -> Self {
    Self {
      messages: [Message::EMPTY; MAX_BUS_MESSAGES],
      timestamps: [0; MAX_BUS_MESSAGES],
      read_idx: 0,
      write_idx: 0,
      count: 0,
    }
  }
}

/// Lives at the head of the shared segment. Every field here is mutated
/// only while the bus's named mutex is held; `ref_count` is additionally
/// atomic so a stray read (e.g. for diagnostics) never tears.
struct ControlBlock {
  ref_count: AtomicU32,
  subscriptions: [Subscription; MAX_SUBSCRIBERS],
  queue: Queue,
}

impl ControlBlock {
  fn init_in_place(slot: &mut ControlBlock) {
    slot.ref_count = AtomicU32::new(1);
    slot.subscriptions = [Subscription::EMPTY; MAX_SUBSCRIBERS];
    slot.queue = Queue::new();
  }
}

/// Handle to the bus held by a single process. Each process (the
/// supervisor that calls [`Bus::init`], or a forked child that calls
/// [`Bus::attach`]) gets its own `Bus`, backed by its own mapping of the
/// same shared segment and its own handle to the same named mutex.
pub struct Bus {
  segment: ShmSegment,
  mutex: NamedMutex,
}

impl Bus {
  /// Allocate the shared segment and named mutex, zero the control
  /// block, and set `ref_count = 1`. Called once, by the process that
  /// will become the supervisor.
  pub fn init() -> Result<Self> {
    Self::init_named(DEFAULT_BUS_NAME)
  }

  /// As [`Bus::init`], but under a caller-chosen name. The production
  /// binary always uses [`DEFAULT_BUS_NAME`]; tests use distinct names
  /// so they don't collide with each other's shared memory objects.
  pub fn init_named(name: &str) -> Result<Self> {
    let segment = ShmSegment::create(name, std::mem::size_of::<ControlBlock>())?;
    let mutex = NamedMutex::create_or_open(name)?;

    unsafe {
      let slot = segment.as_ptr::<ControlBlock>();
      // The segment is freshly ftruncate'd (zero-filled) and not yet
      // observed by any other process, so writing a fresh ControlBlock
      // here without going through `&mut` aliasing rules is sound.
      std::ptr::write(
        slot,
        ControlBlock {
          ref_count: AtomicU32::new(1),
          subscriptions: [Subscription::EMPTY; MAX_SUBSCRIBERS],
          queue: Queue::new(),
        },
      );
    }

    Ok(Self { segment, mutex })
  }

  /// Map the existing segment named `segment_id` and increment
  /// `ref_count` under the mutex. Called by a forked child right after
  /// `fork`, before running its component entry point.
  pub fn attach(segment_id: &str) -> Result<Self> {
    let segment = ShmSegment::open(segment_id, std::mem::size_of::<ControlBlock>())?;
    let mutex = NamedMutex::create_or_open(segment_id)?;

    let bus = Self { segment, mutex };
    let _guard = bus.mutex.lock();
    bus.control().ref_count.fetch_add(1, Ordering::AcqRel);
    drop(_guard);
    Ok(bus)
  }

  /// The name to pass to [`Bus::attach`] from a forked child.
  pub fn get_segment_id(&self) -> &str {
    self.segment.name()
  }

  /// Decrement `ref_count` under the mutex. When it reaches zero, unlink
  /// the mutex and destroy the segment; otherwise just unmap (handled by
  /// `Drop` on the way out).
  pub fn detach(self) {
    let was_last = {
      let _guard = self.mutex.lock();
      self.control().ref_count.fetch_sub(1, Ordering::AcqRel) == 1
    };
    if was_last {
      self.mutex.close();
      self.mutex.unlink();
      self.segment.unlink();
    }
    // `self.segment`'s `Drop` unmaps unconditionally once this scope ends.
  }

  /// Place `(subscriber, msg_type)` into the first free subscription
  /// slot. Duplicate subscriptions are allowed — harmless, since a
  /// message is still delivered to at most one poller overall.
  pub fn subscribe(&self, subscriber: ComponentId, msg_type: MessageType) -> Result<()> {
    let _guard = self.mutex.lock();
    let control = self.control_mut();
    for sub in control.subscriptions.iter_mut() {
      if !sub.active {
        *sub = Subscription {
          subscriber,
          msg_type,
          active: true,
        };
        return Ok(());
      }
    }
    Err(SimError::NoSlot)
  }

  /// Enqueue `message`. Fails with [`SimError::QueueFull`] without
  /// dropping anything already queued.
  pub fn publish(&self, message: Message) -> Result<()> {
    let _guard = self.mutex.lock();
    let control = self.control_mut();
    let queue = &mut control.queue;
    if queue.count >= MAX_BUS_MESSAGES {
      return Err(SimError::QueueFull);
    }
    queue.messages[queue.write_idx] = message;
    queue.timestamps[queue.write_idx] = crate::common::unix_timestamp();
    queue.write_idx = (queue.write_idx + 1) % MAX_BUS_MESSAGES;
    queue.count += 1;
    Ok(())
  }

  /// Non-blocking: return the first queued message whose type matches an
  /// active subscription for `subscriber`, or `None`. Prunes expired
  /// messages first if the queue is more than half full.
  pub fn read_message(&self, subscriber: ComponentId) -> Option<Message> {
    let _guard = self.mutex.lock();
    let control = self.control_mut();

    if control.queue.count > MAX_BUS_MESSAGES / 2 {
      prune_expired(&mut control.queue);
    }

    if control.queue.count == 0 {
      return None;
    }

    let mut cursor = control.queue.read_idx;
    let mut checked = 0;
    let mut matched_at = None;

    while checked < control.queue.count {
      let candidate = &control.queue.messages[cursor];
      let is_match = control.subscriptions.iter().any(|sub| {
        sub.active && sub.subscriber == subscriber && sub.msg_type == candidate.header.msg_type
      });
      if is_match {
        matched_at = Some(cursor);
        break;
      }
      cursor = (cursor + 1) % MAX_BUS_MESSAGES;
      checked += 1;
    }

    let matched_at = matched_at?;
    let message = control.queue.messages[matched_at];
    control.queue.read_idx = (matched_at + 1) % MAX_BUS_MESSAGES;
    control.queue.count -= 1;
    Some(message)
  }

  fn control(&self) -> &ControlBlock {
    // Safety: the segment is sized for exactly one `ControlBlock` and was
    // initialised by `init`/`attach` before this handle was constructed.
    unsafe { &*self.segment.as_ptr::<ControlBlock>() }
  }

  #[allow(clippy::mut_from_ref)]
  fn control_mut(&self) -> &mut ControlBlock {
    // Safety: callers only reach this while holding `self.mutex`, which
    // every other process also acquires before touching the segment.
    unsafe { &mut *self.segment.as_ptr::<ControlBlock>() }
  }
}

/// Advance `read_idx` past any message older than [`MESSAGE_TIMEOUT_S`].
/// Caller must hold the bus mutex.
fn prune_expired(queue: &mut Queue) {
  let now = crate::common::unix_timestamp();
  while queue.count > 0 && now.saturating_sub(queue.timestamps[queue.read_idx]) > MESSAGE_TIMEOUT_S
  {
    queue.read_idx = (queue.read_idx + 1) % MAX_BUS_MESSAGES;
    queue.count -= 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::common::Position;

  fn unique_name(tag: &str) -> String {
    format!("/airplane_sim_test_{tag}_{}", std::process::id())
  }

  #[test]
  fn publish_then_read_round_trips_exact_position() {
    let name = unique_name("roundtrip");
    let bus = Bus::init_named(&name).unwrap();
    bus.subscribe(ComponentId::FlightController, MessageType::PositionUpdate)
      .unwrap();

    let pos = Position::new(37.6188, -122.3750, 0.0);
    bus
      .publish(Message::position_update(ComponentId::Gps, pos))
      .unwrap();

    let received = bus.read_message(ComponentId::FlightController).unwrap();
    match received.payload {
      crate::messages::MessagePayload::PositionUpdate { position } => assert_eq!(position, pos),
      _ => panic!("wrong payload"),
    }
    bus.detach();
  }

  #[test]
  fn read_with_no_match_returns_none() {
    let name = unique_name("nomatch");
    let bus = Bus::init_named(&name).unwrap();
    bus.subscribe(ComponentId::Autopilot, MessageType::StateResponse)
      .unwrap();
    assert!(bus.read_message(ComponentId::Autopilot).is_none());
    bus.detach();
  }

  #[test]
  fn queue_full_does_not_drop_existing_messages() {
    let name = unique_name("full");
    let bus = Bus::init_named(&name).unwrap();
    for _ in 0..MAX_BUS_MESSAGES {
      bus
        .publish(Message::state_request(ComponentId::Autopilot))
        .unwrap();
    }
    let overflow = bus.publish(Message::state_request(ComponentId::Autopilot));
    assert!(matches!(overflow, Err(SimError::QueueFull)));

    bus
      .subscribe(ComponentId::FlightController, MessageType::StateRequest)
      .unwrap();
    let mut drained = 0;
    while bus.read_message(ComponentId::FlightController).is_some() {
      drained += 1;
    }
    assert_eq!(drained, MAX_BUS_MESSAGES);
    bus.detach();
  }

  #[test]
  fn subscribe_fails_once_table_is_full() {
    let name = unique_name("subfull");
    let bus = Bus::init_named(&name).unwrap();
    for _ in 0..MAX_SUBSCRIBERS {
      bus
        .subscribe(ComponentId::Gps, MessageType::PositionUpdate)
        .unwrap();
    }
    let err = bus.subscribe(ComponentId::Gps, MessageType::PositionUpdate);
    assert!(matches!(err, Err(SimError::NoSlot)));
    bus.detach();
  }

  #[test]
  fn first_matching_subscriber_wins_and_removes_message() {
    let name = unique_name("firstwins");
    let bus = Bus::init_named(&name).unwrap();
    bus.subscribe(ComponentId::FlightController, MessageType::PositionUpdate)
      .unwrap();
    bus.subscribe(ComponentId::Ins, MessageType::PositionUpdate)
      .unwrap();

    bus
      .publish(Message::position_update(
        ComponentId::Gps,
        Position::new(1.0, 2.0, 3.0),
      ))
      .unwrap();

    assert!(bus.read_message(ComponentId::FlightController).is_some());
    assert!(bus.read_message(ComponentId::Ins).is_none());
    bus.detach();
  }

  #[test]
  fn ref_counted_attach_detach_leaves_segment_until_last_detach() {
    let name = unique_name("refcount");
    let bus = Bus::init_named(&name).unwrap();
    let attached = Bus::attach(&name).unwrap();
    assert_eq!(bus.control().ref_count.load(Ordering::Acquire), 2);
    attached.detach();
    assert_eq!(bus.control().ref_count.load(Ordering::Acquire), 1);
    bus.detach();
  }
}
