use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use framecast::{
    error::FramecastError, AttachedChannel, CaptureSession, ChannelStats, Result, ShimBinary,
};
use serde::Serialize;
use std::{
    str::FromStr,
    time::{Duration, Instant},
};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("framecast-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Capture frames from an injected process over shared memory")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("launch")
                .about("Create a channel and start a target with the capture shim preloaded")
                .setting(AppSettings::TrailingVarArg)
                .arg(
                    Arg::with_name("max_pixels")
                        .short("p")
                        .long("max-pixels")
                        .value_name("PIXELS")
                        .help("Largest frame the target may produce, in pixels")
                        .default_value("8294400")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("slots")
                        .short("s")
                        .long("slots")
                        .value_name("COUNT")
                        .help("Number of ring slots")
                        .default_value("5")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("shim_dir")
                        .long("shim-dir")
                        .value_name("DIR")
                        .help("Private directory the shims are staged into")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("shim")
                        .long("shim")
                        .value_name("PATH")
                        .help("Shim library to preload instead of the bundled pair")
                        .multiple(true)
                        .number_of_values(1)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("no_autostart")
                        .long("no-autostart")
                        .help("Only print the command; start the target yourself"),
                )
                .arg(
                    Arg::with_name("print_config")
                        .long("print-config")
                        .help("Print the effective configuration as JSON and exit"),
                )
                .arg(
                    Arg::with_name("timeout")
                        .short("t")
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Stop consuming after this many seconds without a frame")
                        .default_value("10")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("command")
                        .value_name("COMMAND")
                        .help("Command line of the target")
                        .required(true)
                        .multiple(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Attach to an existing channel and print its header")
                .arg(
                    Arg::with_name("channel")
                        .short("c")
                        .long("channel")
                        .value_name("ID")
                        .help("Header segment id of the channel")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print statistics as JSON"),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show version and protocol information"))
        .get_matches();

    match matches.subcommand() {
        ("launch", Some(launch_matches)) => handle_launch(launch_matches),
        ("inspect", Some(inspect_matches)) => handle_inspect(inspect_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .ok_or_else(|| FramecastError::invalid_parameter(name, "Missing value"))?
        .parse()
        .map_err(|_| FramecastError::invalid_parameter(name, "Invalid number format"))
}

fn handle_launch(matches: &ArgMatches) -> Result<()> {
    let command = matches
        .values_of("command")
        .map(|words| words.collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let max_pixels: u32 = parse_arg(matches, "max_pixels")?;
    let slots: u32 = parse_arg(matches, "slots")?;
    let timeout = Duration::from_secs(parse_arg(matches, "timeout")?);

    let mut builder = CaptureSession::builder(command)
        .max_pixels(max_pixels)
        .capacity(slots)
        .autostart(!matches.is_present("no_autostart"));
    if let Some(dir) = matches.value_of("shim_dir") {
        builder = builder.shim_dir(dir);
    }
    if let Some(paths) = matches.values_of("shim") {
        let shims = paths
            .map(ShimBinary::from_file)
            .collect::<Result<Vec<_>>>()?;
        builder = builder.shims(shims);
    }

    if matches.is_present("print_config") {
        return print_json(builder.config());
    }

    let mut session = builder.build()?;
    let channel_id = session.channel_id().unwrap_or(-1);
    println!("Channel: {}", channel_id);
    println!("Command: {}", session.full_command());
    if session.process().is_none() {
        println!("Start the command above, then frames will be reported here");
    }

    consume_frames(&mut session, timeout)?;
    session.close()
}

fn consume_frames(session: &mut CaptureSession, timeout: Duration) -> Result<()> {
    let mut frames = 0u64;
    let started = Instant::now();

    loop {
        let frame_size = match session.channel() {
            Some(channel) => {
                let mut consumer = channel.consumer()?;
                let size = consumer
                    .wait_frame(timeout)?
                    .map(|frame| (frame.slot(), frame.width(), frame.height()));
                size
            }
            None => return Ok(()),
        };

        match frame_size {
            Some((slot, width, height)) => {
                frames += 1;
                println!("frame {:>6}  slot {}  {}x{}", frames, slot, width, height);
            }
            None => {
                println!("No frame for {:?}, stopping", timeout);
                break;
            }
        }

        if let Some(process) = session.process_mut() {
            if !process.is_running() {
                println!("Target exited");
                break;
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        println!("\nReceived {} frames ({:.1} fps)", frames, frames as f64 / elapsed);
    }
    Ok(())
}

fn handle_inspect(matches: &ArgMatches) -> Result<()> {
    let id: i32 = parse_arg(matches, "channel")?;
    let channel = AttachedChannel::attach(id)?;
    let stats = channel.stats();

    if matches.is_present("json") {
        print_json(&stats)
    } else {
        print_stats(&stats);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| FramecastError::invalid_parameter("json", e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn print_stats(stats: &ChannelStats) {
    println!("Channel {}", stats.channel_id);
    println!("  Protocol:     {}", stats.protocol);
    println!("  Slots:        {}", stats.capacity);
    println!("  Max pixels:   {}", stats.max_pixels);
    println!(
        "  Cursors:      read {} / write {} ({} in flight, {:.0}%)",
        stats.read_cursor,
        stats.write_cursor,
        stats.occupancy,
        stats.utilization() * 100.0
    );
    println!(
        "  Current size: {}x{}",
        stats.current_width, stats.current_height
    );
    println!("  Slot segments: {:?}", stats.slot_ids);
}

fn show_info() -> Result<()> {
    let (major, minor) = framecast::structured_layout::version_parts(framecast::PROTOCOL_VERSION);
    println!("framecast {}", framecast::VERSION);
    println!("  Protocol version: {}.{}", major, minor);
    println!("  Channel variable: {}", framecast::CHANNEL_ENV_VAR);
    println!(
        "  Header size:      {} bytes + {} per slot",
        framecast::structured_layout::HEADER_SIZE,
        framecast::structured_layout::SLOT_DESCRIPTOR_SIZE
    );
    Ok(())
}
