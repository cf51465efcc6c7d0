use anyhow::{Result, bail};

use crate::cli::SendOpts;
use crate::controller::Controller;
use crate::event;
use crate::proto::DirMask;
use crate::settings::FileSettings;

pub fn run(opts: SendOpts) -> Result<()> {
    let Some(dir) = DirMask::from_mnemonic(&opts.dir) else {
        bail!("unknown direction mnemonic {:?}", opts.dir);
    };

    let (events, ui) = event::spawn_printer();
    let controller = Controller::new(FileSettings::new(), events);
    if let Some(name) = &opts.link.port {
        controller.set_port_name(name);
    }
    controller.connect();
    controller.send_direction(dir, Some(opts.speed));
    controller.disconnect();

    drop(controller);
    let _ = ui.join();
    Ok(())
}
