pub const BANNER: &str = r#"
 ____                 _____
|  _ \ __ _  ___ ___ |  ___|__  _ __ __ _  ___
| |_) / _` |/ __/ _ \| |_ / _ \| '__/ _` |/ _ \
|  _ < (_| | (_|  __/|  _| (_) | | | (_| |  __/
|_| \_\__,_|\___\___||_|  \___/|_|  \__, |\___|
                                     |___/
"#;
