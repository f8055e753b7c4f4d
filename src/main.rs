// This is my entry point for running a node
// I load the config, open the TCP listener, connect to the peers I know about and
// then hand the terminal over to the shell
use clap::Parser;
use hashchain_node::cli::{Opt, Shell};
use hashchain_node::network::{listen, Node, Peer, TcpPeer, Transport};
use hashchain_node::Config;
use log::{error, info, warn, LevelFilter};
use std::io;
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default, RUST_LOG can still turn it up or down
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_node(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(opt: &Opt) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(opt.config.as_deref())?;
    if let Some(addr) = &opt.addr {
        config.set_node_addr(addr.clone());
    }
    for peer in &opt.peers {
        config.add_peer(peer.clone());
    }
    if let Some(zeros) = opt.difficulty {
        config.set_required_prefix_zeros(zeros);
    }
    Ok(config)
}

fn run_node(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&opt)?;

    // I let replies reach nodes that contacted me first, even if they aren't in my peer list
    let mut transport = Transport::new(config.get_node_addr());
    transport.set_dialer(Box::new(
        |addr: &str| -> hashchain_node::Result<Arc<dyn Peer>> { Ok(Arc::new(TcpPeer::new(addr)?)) },
    ));

    let bound = listen(config.get_node_addr(), transport.inbox_sender())?;
    info!("Node {} bound to {bound}", config.extract_node_id_from_addr());

    for peer in config.get_peers() {
        match TcpPeer::new(peer) {
            Ok(tcp_peer) => transport.connect(Arc::new(tcp_peer)),
            Err(e) => warn!("Skipping peer {peer}: {e}"),
        }
    }

    let node = Arc::new(Node::new(&config, transport)?);
    let dispatch = node.listen();

    for peer in config.get_peers() {
        if let Err(e) = node.sync_with(peer) {
            warn!("Initial sync with {peer} failed: {e}");
        }
    }

    let shell = Shell::new(Arc::clone(&node));
    if let Some(script) = &opt.script {
        let output = shell.run_script(script)?;
        if !output.is_empty() {
            println!("{output}");
        }
    }

    let stdin = io::stdin();
    shell.run_interactive(stdin.lock(), io::stdout())?;

    node.kill();
    if dispatch.join().is_err() {
        error!("Dispatch loop panicked");
    }
    Ok(())
}
