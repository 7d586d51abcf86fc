mod cli;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use clap::Parser;
use tree_fs::{TreeFileSystem, WorkDir};
use tree_fs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let disk_size = ByteSizeIec::mib(4).0;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(cli.out_dir.join("fs.img"))?;
    fd.set_len(disk_size)?;

    let fs = TreeFileSystem::format(Arc::new(BlockFile(Mutex::new(fd))));
    let root = WorkDir::root();

    if let Some(source) = &cli.source {
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_str().expect("file name is not UTF-8");
            log::info!("packing {name:?}");

            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;

            fs.create(&root, name, data.len()).expect("create failed");
            let file = fs.open(&root, name).expect("open failed");
            file.write_at(0, &data).expect("write failed");
        }
    }

    fs.close();
    Ok(())
}
