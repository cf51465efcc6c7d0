use anyhow::Result;

use crate::cli::RunOpts;
use crate::controller::Controller;
use crate::event;
use crate::settings::FileSettings;

pub fn run(opts: RunOpts) -> Result<()> {
    let (events, ui) = event::spawn_printer();
    let controller = Controller::new(FileSettings::new(), events);
    if let Some(name) = &opts.link.port {
        controller.set_port_name(name);
    }
    controller.connect();

    if controller.play_sequence(opts.strict) {
        controller.wait_sequence();
    }
    controller.disconnect();

    drop(controller);
    let _ = ui.join();
    Ok(())
}
