use blockmap::geometry::{NUM_SECTORS, SECTOR_SIZE};
use blockmap::io::SectorEmulatorBuilder;
use blockmap::{lifecycle, Bitmap, FreeMap};

pub fn main() {
    env_logger::init();

    let tmp = tempfile::tempfile().unwrap();
    let mut dev = SectorEmulatorBuilder::from(tmp)
        .with_sector_count(NUM_SECTORS)
        .build()
        .expect("Could not initialize disk emulator.");
    let mut free_map = Bitmap::new(NUM_SECTORS);

    // A file large enough to reach the double indirect block.
    let (sector, header) = lifecycle::create(&mut dev, &mut free_map, 80 * SECTOR_SIZE + 17)
        .expect("should create");
    println!("header at sector {}", sector);
    println!("{}", header.block_listing(&mut dev).unwrap());
    println!("{} sectors free", free_map.free_count());

    lifecycle::remove(&mut dev, &mut free_map, sector).expect("should remove");
    println!("{} sectors free after removal", free_map.free_count());
}
