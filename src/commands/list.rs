//! List command implementation

use dflash_core::family::{FamilyDatabase, Firmware};

use super::format_size;

/// List all known flash families
pub fn list_families(db: &FamilyDatabase) {
    println!("Known flash families:");
    println!();
    println!(
        "{:<16} {:>8} {:>8} {:>5} {:>9} {:>7}",
        "Name", "Size", "Block", "Unit", "Firmware", "UID"
    );
    println!("{}", "-".repeat(60));

    for family in db.iter() {
        let firmware = match family.firmware {
            Firmware::NotRequired => "-",
            Firmware::Required { .. } => "yes",
        };
        println!(
            "{:<16} {:>8} {:>8} {:>5} {:>9} {:>7}",
            family.name,
            format_size(family.geometry.size),
            format_size(family.geometry.block_size),
            family.geometry.program_unit,
            firmware,
            family.unique_id_count()
        );
    }
}
