fn main() {
    // The window shell embeds tauri.conf.json and the icon set; headless
    // builds skip codegen entirely.
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }

    println!("cargo:rerun-if-changed=src/db/schemas");
}
