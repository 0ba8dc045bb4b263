fn main() {
    // Windows: embed the manifest and icon when they are present
    #[cfg(target_os = "windows")]
    {
        let mut res = winres::WindowsResource::new();
        if std::path::Path::new("app.manifest").exists() {
            res.set_manifest_file("app.manifest");
        }
        if std::path::Path::new("assets/litestream.ico").exists() {
            res.set_icon("assets/litestream.ico");
        }
        if let Err(e) = res.compile() {
            eprintln!("Warning: Failed to embed Windows resources: {}", e);
        }
    }
}
