// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use juicy::config::{Limits, read_prefix};
use juicy::metadata::{PICTURE_FIELD, TagResult, read_tags};

/// Displays the tags and cover art of one or more audio files
///
/// Only the start of each file is read,
/// and files are parsed as many at a time as
/// the machine's default tag-parsing limit allows.

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let files = std::env::args().skip(1).collect::<Vec<_>>();
    if files.is_empty() {
        eprintln!("* Usage: juicy-tags <file> [file ...]");
        return;
    }

    let limiter = Limits::detect().metadata_limiter();

    let tasks = files
        .into_iter()
        .map(|path| {
            let task = limiter.run({
                let path = path.clone();
                move || async move { read_file(&path) }
            });
            (path, task)
        })
        .collect::<Vec<_>>();

    for (path, task) in tasks {
        match task.await {
            Ok(Ok(TagResult { tags, picture })) => {
                println!("{path}");
                for (field, value) in tags.iter().filter(|(f, _)| *f != PICTURE_FIELD) {
                    println!("  {field}={value}");
                }
                if let Some(picture) = picture {
                    println!(
                        "  picture : {} {}x{} ({} bytes)",
                        picture.media_type(),
                        picture.width,
                        picture.height,
                        picture.data.len()
                    );
                }
            }
            Ok(Err(err)) | Err(err) => eprintln!("* Error: {path} - {err}"),
        }
    }
}

fn read_file(path: &str) -> Result<TagResult, juicy::Error> {
    read_tags(&read_prefix(std::fs::File::open(path)?)?)
}
