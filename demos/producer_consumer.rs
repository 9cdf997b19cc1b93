//! # Producer / Consumer Handoff
//!
//! **What this example teaches:**
//! - Guarding shared state with its own monitor through `Synchronized`
//! - Two-sided `wait` / `notify_all` handoff of single packets
//! - Sleeping outside the monitor so the other side can make progress
//! - Treating `Interrupted` as a request to stop: report it and end the thread
//!
//! **When to use this pattern:**
//! - Passing work between exactly two threads without a channel
//! - Understanding how condition-style monitors replace busy polling

use objsync::prelude::*;
use std::{cell::RefCell, sync::Arc, time::Duration};

const PACKETS: [&str; 5] = [
    "First packet",
    "Second packet",
    "Third packet",
    "Fourth packet",
    "End",
];

/// A single-slot mailbox. `transfer` is true while the receiver has to wait.
struct Data {
    packet: Option<String>,
    transfer: bool,
}

type Mailbox = Synchronized<RefCell<Data>>;

/// Blocks until the previous packet was taken, then places `packet`.
fn send(mailbox: &Mailbox, packet: &str) -> Result<()> {
    let mut guard = mailbox.lock();
    while !guard.borrow().transfer {
        wait_for_turn(&mut guard)?;
    }

    {
        let mut data = guard.borrow_mut();
        data.transfer = false;
        data.packet = Some(packet.to_string());
    }
    guard.notify_all()
}

/// Blocks until a packet is available and takes it.
fn receive(mailbox: &Mailbox) -> Result<String> {
    let mut guard = mailbox.lock();
    while guard.borrow().transfer {
        wait_for_turn(&mut guard)?;
    }

    let packet = {
        let mut data = guard.borrow_mut();
        data.transfer = true;
        data.packet.take().unwrap_or_default()
    };
    guard.notify_all()?;
    Ok(packet)
}

/// Waits once, reporting an interrupt before handing it to the caller.
fn wait_for_turn(guard: &mut SynchronizedGuard<'_, RefCell<Data>>) -> Result<()> {
    match guard.wait() {
        Ok(_) => Ok(()),
        Err(Error::Interrupted) => {
            println!("Thread Interrupted");
            Err(Error::Interrupted)
        }
        Err(e) => Err(e),
    }
}

/// Sleeps between packets to mimic heavy processing.
fn pause(step: u32) -> Result<()> {
    Thread::sleep(Duration::from_millis(u64::from(step) * 500)).inspect_err(|e| {
        if matches!(e, Error::Interrupted) {
            eprintln!("Thread Interrupted");
        }
    })
}

fn main() -> Result<()> {
    let mailbox: Arc<Mailbox> = Arc::new(Synchronized::new(RefCell::new(Data {
        packet: None,
        transfer: true,
    })));

    let m = mailbox.clone();
    let sender = Thread::builder().name("sender").build(move || {
        for (step, packet) in (0u32..).zip(PACKETS) {
            send(&m, packet)?;
            pause(step)?;
        }
        Ok(())
    });

    let m = mailbox.clone();
    let receiver = Thread::builder().name("receiver").build(move || {
        let mut step = 0;
        loop {
            let packet = receive(&m)?;
            if packet == "End" {
                return Ok(());
            }
            println!("{packet}");
            pause(step)?;
            step += 1;
        }
    });

    sender.start()?;
    receiver.start()?;

    sender.join()?;
    receiver.join()?;

    Ok(())
}
