use std::io::{self, BufRead};

use anyhow::Result;

use crate::cli::DriveOpts;
use crate::controller::Controller;
use crate::event;
use crate::proto::DirMask;
use crate::settings::FileSettings;

/// Line-driven interactive mode: press/release direction bits the way the
/// arrow keys would. A running sequence is cancelled by the next interactive
/// command; the shared drive-state lock keeps the two paths from
/// interleaving mid-command.
pub fn run(opts: DriveOpts) -> Result<()> {
    let (events, ui) = event::spawn_printer();
    let controller = Controller::new(FileSettings::new(), events);
    if let Some(name) = &opts.link.port {
        controller.set_port_name(name);
    }
    controller.connect();
    if !controller.is_connected() {
        eprintln!("[drive] not connected; commands will be dropped");
    }

    eprintln!(
        "[drive] +f/+b/+l/+r press, -f/-b/-l/-r release, s <0-255> speed, p play sequence, q quit"
    );
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "q" {
            break;
        }
        if line == "p" {
            if !controller.play_sequence(false) && controller.sequence_running() {
                eprintln!("[drive] a sequence is already running");
            }
            continue;
        }
        // any interactive command takes the controls back from a script
        if controller.sequence_running() {
            controller.cancel_sequence();
            controller.wait_sequence();
        }
        if let Some(rest) = line.strip_prefix('s')
            && let Ok(speed) = rest.trim().parse::<u8>()
        {
            controller.set_speed(speed);
            continue;
        }
        if let Some(key) = line.strip_prefix('+')
            && let Some(bit) = key_bit(key.trim())
        {
            controller.press(bit);
            continue;
        }
        if let Some(key) = line.strip_prefix('-')
            && let Some(bit) = key_bit(key.trim())
        {
            controller.release(bit);
            continue;
        }
        eprintln!("[drive] unrecognized input {:?}", line);
    }

    // leaving interactive mode never leaves the vehicle moving
    controller.cancel_sequence();
    controller.wait_sequence();
    controller.stop();
    controller.disconnect();

    drop(controller);
    let _ = ui.join();
    Ok(())
}

fn key_bit(key: &str) -> Option<DirMask> {
    match key {
        "f" => Some(DirMask::FORWARD),
        "b" => Some(DirMask::BACKWARD),
        "l" => Some(DirMask::LEFT),
        "r" => Some(DirMask::RIGHT),
        _ => None,
    }
}
