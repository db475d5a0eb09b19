//! Basic usage example for the relay wire protocol.

use bytes::Bytes;
use relay_wire::{Fragmenter, Frame, Reassembler, Request, DEFAULT_FRAGMENT_SIZE};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Relay Wire Protocol Example ===\n");

    // 1. Encode a fetch request
    println!("1. Encoding a fetch request...");
    let request = Request::new("http://example.com/index.html", 5)?;
    let request_bytes = request.encode();
    println!("   Request datagram: {:?}", request_bytes);

    let decoded = Request::decode(&request_bytes)?;
    println!(
        "   Decoded locator={} ack_timeout={}s",
        decoded.locator, decoded.ack_timeout_secs
    );

    // 2. Fragment a payload
    println!("\n2. Fragmenting a 2500 byte payload...");
    let payload = Bytes::from(vec![0x42u8; 2500]);
    let fragmenter = Fragmenter::new(DEFAULT_FRAGMENT_SIZE)?;
    let frames = fragmenter.fragment(&payload)?;
    for frame in &frames {
        println!(
            "   seq={} total={} payload_len={}",
            frame.seq,
            frame.total,
            frame.payload_len()
        );
    }

    // 3. Encode to datagrams and reassemble in reverse order
    println!("\n3. Reassembling from datagrams (reverse order)...");
    let datagrams: Vec<Bytes> = frames.iter().map(Frame::encode).collect();
    let mut reassembler = Reassembler::new();
    for datagram in datagrams.iter().rev() {
        let complete = reassembler.insert(Frame::decode(datagram)?)?;
        println!(
            "   received {}/{} complete={}",
            reassembler.received(),
            reassembler.expected_total().unwrap_or(0),
            complete
        );
    }

    let message = reassembler.finish()?;
    println!("   Reassembled message size: {} bytes", message.len());
    println!("   Original matches reassembled: {}", message == payload);

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
