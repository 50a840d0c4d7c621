fn main() {
    attention_lib::run()
}
