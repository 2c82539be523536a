fn main() -> anyhow::Result<()> {
    cam_recorder::run()
}
